use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::Error;
use crate::logs::LogDecoder;
use crate::logs::idl::Idl;
use crate::types::ProgramEvent;

/// Reads Anchor `emit!` events out of raw transaction log lines.
///
/// Tracks the invocation stack from `Program <id> invoke [n]` and
/// `Program <id> success|failed` lines, and only decodes `Program data:`
/// payloads logged while `program_id` is the innermost running program.
#[derive(Clone)]
pub struct AnchorLogDecoder {
    program_id: String,
    idl: Arc<Idl>,
}

impl AnchorLogDecoder {
    pub fn new(program_id: impl Into<String>, idl: Arc<Idl>) -> Self {
        Self {
            program_id: program_id.into(),
            idl,
        }
    }
}

impl LogDecoder for AnchorLogDecoder {
    fn decode(&self, log_messages: &[String]) -> Result<Vec<ProgramEvent>, Error> {
        let mut stack: Vec<&str> = Vec::new();
        let mut events = Vec::new();

        for line in log_messages {
            let Some(rest) = line.strip_prefix("Program ") else {
                continue;
            };
            if let Some(data) = rest.strip_prefix("data: ") {
                if stack.last() != Some(&self.program_id.as_str()) {
                    continue;
                }
                let payload = STANDARD.decode(data.trim()).map_err(|e| Error::Parse {
                    reason: format!("invalid base64 program data: {e}"),
                })?;
                if let Some(event) = self.idl.decode_event(&payload)? {
                    events.push(event);
                }
                continue;
            }

            let mut words = rest.split_whitespace();
            let (Some(program), Some(action)) = (words.next(), words.next()) else {
                continue;
            };
            match action {
                "invoke" => stack.push(program),
                "success" => {
                    stack.pop();
                }
                _ if action.starts_with("failed") => {
                    stack.pop();
                }
                _ => {}
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use super::*;
    use crate::logs::idl::tests::{encode_deposit, legacy_idl};

    const PROGRAM: &str = "dRiftyHA39MWEi3m9aunc5MzRF1JYuBsbn6VPcn33UH";

    fn decoder() -> AnchorLogDecoder {
        let idl = Idl::from_json(legacy_idl().to_string().as_bytes()).unwrap();
        AnchorLogDecoder::new(PROGRAM, Arc::new(idl))
    }

    fn data_line(amount: u64) -> String {
        format!("Program data: {}", STANDARD.encode(encode_deposit(amount)))
    }

    #[test]
    fn collects_events_only_while_program_runs() {
        let logs = vec![
            "Program ComputeBudget111111111111111111111111111111 invoke [1]".to_string(),
            "Program ComputeBudget111111111111111111111111111111 success".to_string(),
            format!("Program {PROGRAM} invoke [1]"),
            "Program log: Instruction: Deposit".to_string(),
            "Program TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA invoke [2]".to_string(),
            data_line(1),
            "Program TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA success".to_string(),
            data_line(2),
            format!("Program {PROGRAM} consumed 51234 of 200000 compute units"),
            format!("Program {PROGRAM} success"),
            data_line(3),
        ];
        let events = decoder().decode(&logs).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "DepositRecord");
        assert_eq!(events[0].data["amount"], serde_json::json!(2));
    }

    #[test]
    fn malformed_payload_fails_the_transaction() {
        let logs = vec![
            format!("Program {PROGRAM} invoke [1]"),
            "Program data: !!not-base64!!".to_string(),
        ];
        assert!(matches!(
            decoder().decode(&logs).unwrap_err(),
            Error::Parse { .. }
        ));
    }

    #[test]
    fn failed_invocation_pops_the_stack() {
        let logs = vec![
            format!("Program {PROGRAM} invoke [1]"),
            "Program Other1111111111111111111111111111111111 invoke [2]".to_string(),
            "Program Other1111111111111111111111111111111111 failed: custom program error: 0x1"
                .to_string(),
            data_line(5),
        ];
        let events = decoder().decode(&logs).unwrap();
        assert_eq!(events.len(), 1);
    }
}
