//! Internal functional test mode (`-F`).
//!
//! Instead of running the lifecycle, push a table of status messages at the
//! coordinator and compare its answers with what a coordinator loaded with the
//! same snapshot must reply.

use tgo_common::{Phase, ReplyCode, StatusMsg};
use tracing::{error, info};

use crate::environment::Fleet;
use crate::errors::StatusError;
use crate::status::StatusReporter;

/// UID no snapshot contains.
pub const UNKNOWN_UID: &str = "tgo-functest-nobody";
/// Label no coordinator accepts.
pub const UNKNOWN_LABEL: &str = "YACK";

/// One status push and the verdict expected for it.
#[derive(Debug, Clone)]
pub struct Case {
    pub msg: StatusMsg,
    pub http_status: u16,
    pub reply_code: ReplyCode,
}

impl Case {
    fn new(msg: StatusMsg, reply_code: ReplyCode) -> Self {
        Self {
            msg,
            http_status: 200,
            reply_code,
        }
    }
}

/// Build the table for the current instance: the two refusals first, then
/// every reportable label for every app.
pub fn cases(fleet: &Fleet) -> Vec<Case> {
    let inst = &fleet.instance().inst_name;
    let known_uid = fleet
        .apps()
        .first()
        .map(|a| a.uid.as_str())
        .unwrap_or_else(|| fleet.self_uid());

    let mut table = vec![
        Case::new(
            StatusMsg::new(Phase::Initializing.label(), inst, UNKNOWN_UID),
            ReplyCode::NoSuchInstance,
        ),
        Case::new(
            StatusMsg::new(UNKNOWN_LABEL, inst, known_uid),
            ReplyCode::InvalidState,
        ),
    ];
    for phase in Phase::reportable() {
        for app in fleet.apps() {
            table.push(Case::new(
                StatusMsg::new(phase.label(), inst, &app.uid),
                ReplyCode::Ok,
            ));
        }
    }
    table
}

/// Run the table, stopping at the first mismatch. Returns the number of
/// failed cases. An unreachable coordinator is an error.
pub async fn run(fleet: &Fleet, reporter: &StatusReporter) -> Result<usize, StatusError> {
    let mut failures = 0;
    for (i, case) in cases(fleet).into_iter().enumerate() {
        let exchange = reporter.send(&case.msg).await?;
        if exchange.http_status != case.http_status {
            error!(
                expected = case.http_status,
                got = exchange.http_status,
                "Bad HTTP response code"
            );
            failures += 1;
            break;
        }
        let code = exchange.reply().map(|r| r.reply_code);
        match code {
            Ok(code) if code == case.reply_code => {
                info!(case = i, state = %case.msg.state, uid = %case.msg.uid, "PASSED");
                println!("test {} PASSED", i);
            }
            Ok(code) => {
                error!(expected = %case.reply_code, got = %code, "Bad ReplyCode");
                failures += 1;
                break;
            }
            Err(e) => {
                error!(error = %e, "Bad reply");
                failures += 1;
                break;
            }
        }
    }
    Ok(failures)
}
