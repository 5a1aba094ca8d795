use super::state::Stub;
use crate::paper::{CONTRACT_NAMESPACE, CommercialPaper, PaperState, decode, encode};

/// Commercial paper contract. Errors are returned as the message a peer
/// puts in its failed proposal response.
pub fn invoke(stub: &mut Stub<'_>, function: &str, args: &[String]) -> Result<Vec<u8>, String> {
    let (namespace, transaction) = function
        .split_once(':')
        .ok_or_else(|| format!("function '{}' does not name a contract", function))?;
    if namespace != CONTRACT_NAMESPACE {
        return Err(format!("contract '{}' not found in chaincode", namespace));
    }

    match transaction {
        "issue" => issue(stub, arity(transaction, args, 5)?),
        "buy" => buy(stub, arity(transaction, args, 7)?),
        "redeem" => redeem(stub, arity(transaction, args, 5)?),
        "getPaper" => {
            let args = arity(transaction, args, 2)?;
            let paper = load(stub, &args[0], &args[1])?;
            encode(&paper).map_err(|e| e.to_string())
        }
        other => Err(format!(
            "transaction '{}' not found in contract '{}'",
            other, namespace
        )),
    }
}

fn arity<'a>(transaction: &str, args: &'a [String], expected: usize) -> Result<&'a [String], String> {
    if args.len() != expected {
        return Err(format!(
            "{} expects {} arguments, got {}",
            transaction,
            expected,
            args.len()
        ));
    }
    Ok(args)
}

fn load(stub: &mut Stub<'_>, issuer: &str, paper_number: &str) -> Result<CommercialPaper, String> {
    let key = CommercialPaper::make_key(issuer, paper_number);
    let bytes = stub
        .get_state(&key)
        .ok_or_else(|| format!("paper {} does not exist", key))?;
    decode(&bytes).map_err(|e| format!("stored paper {} is corrupt: {}", key, e))
}

fn store(stub: &mut Stub<'_>, paper: &CommercialPaper) -> Result<Vec<u8>, String> {
    let bytes = encode(paper).map_err(|e| e.to_string())?;
    stub.put_state(&paper.key(), bytes.clone());
    Ok(bytes)
}

fn parse_amount(field: &str, raw: &str) -> Result<u64, String> {
    raw.parse()
        .map_err(|_| format!("{} '{}' is not a whole amount", field, raw))
}

fn issue(stub: &mut Stub<'_>, args: &[String]) -> Result<Vec<u8>, String> {
    let key = CommercialPaper::make_key(&args[0], &args[1]);
    if stub.get_state(&key).is_some() {
        return Err(format!("paper {} already exists", key));
    }
    let paper = CommercialPaper {
        issuer: args[0].clone(),
        paper_number: args[1].clone(),
        owner: args[0].clone(),
        owner_msp: Some(stub.creator().msp_id.clone()),
        issue_date: args[2].clone(),
        maturity_date: args[3].clone(),
        face_value: parse_amount("face value", &args[4])?,
        state: PaperState::Issued,
        redeem_date: None,
    };
    store(stub, &paper)
}

fn buy(stub: &mut Stub<'_>, args: &[String]) -> Result<Vec<u8>, String> {
    let mut paper = load(stub, &args[0], &args[1])?;
    let (current_owner, new_owner, new_owner_msp) = (&args[2], &args[3], &args[4]);
    parse_amount("price", &args[5])?;

    if paper.owner != *current_owner {
        return Err(format!(
            "paper {} is not owned by {}",
            paper.key(),
            current_owner
        ));
    }
    match paper.state {
        PaperState::Redeemed => {
            return Err(format!("paper {} has already been redeemed", paper.key()));
        }
        PaperState::Issued => paper.state = PaperState::Traded,
        PaperState::Traded => {}
    }
    paper.owner = new_owner.clone();
    paper.owner_msp = Some(new_owner_msp.clone());
    store(stub, &paper)
}

fn redeem(stub: &mut Stub<'_>, args: &[String]) -> Result<Vec<u8>, String> {
    let mut paper = load(stub, &args[0], &args[1])?;
    let (redeeming_owner, redeeming_owner_msp, redeem_date) = (&args[2], &args[3], &args[4]);

    if paper.is_redeemed() {
        return Err(format!("paper {} has already been redeemed", paper.key()));
    }
    if paper.owner != *redeeming_owner {
        return Err(format!(
            "redeeming owner {} does not currently own paper {}",
            redeeming_owner,
            paper.key()
        ));
    }
    if paper.owner_msp.as_deref() != Some(redeeming_owner_msp.as_str()) {
        return Err(format!(
            "paper {} cannot be redeemed by {}, it is not the owning organization",
            paper.key(),
            redeeming_owner_msp
        ));
    }

    paper.state = PaperState::Redeemed;
    paper.redeem_date = Some(redeem_date.clone());
    store(stub, &paper)
}
