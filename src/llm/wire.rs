// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Line codec for the chat endpoint's data stream
//!
//! Each line is `<code>:<json>`. Codes we understand:
//!
//! | code | payload                                  | event            |
//! |------|------------------------------------------|------------------|
//! | `0`  | JSON string                              | `Token`          |
//! | `9`  | `{toolCallId, toolName, args}`           | `ToolCall`       |
//! | `3`  | JSON string                              | `Error`          |
//! | `d`  | `{finishReason, ...}`                    | `Finish`         |
//!
//! Every other code (step markers, annotations, usage) is skipped.

use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::llm::transport::{FinishReason, StreamEvent, ToolCallRequest};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinishPayload {
    #[serde(default)]
    finish_reason: Option<FinishReason>,
}

/// Decode one line of the data stream.
///
/// Returns `Ok(None)` for blank lines and codes that carry no session event.
pub fn decode_line(line: &str) -> Result<Option<StreamEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let Some((code, payload)) = line.split_once(':') else {
        return Err(invalid(format!("missing type prefix: {}", line)));
    };

    let event = match code {
        "0" => StreamEvent::Token(parse_string(payload)?),
        "3" => StreamEvent::Error {
            message: parse_string(payload)?,
        },
        "9" => {
            let call: ToolCallRequest = serde_json::from_str(payload)
                .map_err(|e| invalid(format!("bad tool call payload: {}", e)))?;
            StreamEvent::ToolCall(call)
        }
        "d" => {
            let finish: FinishPayload = serde_json::from_str(payload)
                .map_err(|e| invalid(format!("bad finish payload: {}", e)))?;
            StreamEvent::Finish {
                reason: finish.finish_reason.unwrap_or(FinishReason::Stop),
            }
        }
        _ => return Ok(None),
    };

    Ok(Some(event))
}

/// Split complete lines off the front of `buffer`, leaving any partial tail.
///
/// Works on raw bytes so a multi-byte character split across network chunks
/// is only decoded once its line is complete.
pub fn drain_lines(buffer: &mut Vec<u8>) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=line_end).collect();
        lines.push(decode_utf8(line)?.trim_end_matches(['\r', '\n']).to_string());
    }
    Ok(lines)
}

/// Decode a complete line of the stream body
pub fn decode_utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| invalid(format!("stream is not valid UTF-8: {}", e)))
}

fn parse_string(payload: &str) -> Result<String> {
    serde_json::from_str::<String>(payload)
        .map_err(|e| invalid(format!("expected JSON string: {}", e)))
}

fn invalid(message: String) -> crate::error::ParleyError {
    ApiError::InvalidResponse(message).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_token() {
        let event = decode_line(r#"0:"Hel""#).unwrap();
        assert_eq!(event, Some(StreamEvent::Token("Hel".to_string())));
    }

    #[test]
    fn test_decode_token_with_escapes() {
        let event = decode_line(r#"0:"line\n\"quoted\" 72°F""#).unwrap();
        assert_eq!(
            event,
            Some(StreamEvent::Token("line\n\"quoted\" 72°F".to_string()))
        );
    }

    #[test]
    fn test_decode_tool_call() {
        let line = r#"9:{"toolCallId":"call_1","toolName":"weather","args":{"location":"Boston"}}"#;
        match decode_line(line).unwrap() {
            Some(StreamEvent::ToolCall(call)) => {
                assert_eq!(call.tool_call_id, "call_1");
                assert_eq!(call.tool_name, "weather");
                assert_eq!(call.args["location"], "Boston");
            }
            other => panic!("expected tool call, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_error() {
        let event = decode_line(r#"3:"model overloaded""#).unwrap();
        assert_eq!(
            event,
            Some(StreamEvent::Error {
                message: "model overloaded".to_string()
            })
        );
    }

    #[test]
    fn test_decode_finish() {
        let event = decode_line(r#"d:{"finishReason":"tool-calls","usage":{"promptTokens":3}}"#)
            .unwrap();
        assert_eq!(
            event,
            Some(StreamEvent::Finish {
                reason: FinishReason::ToolCalls
            })
        );
    }

    #[test]
    fn test_decode_finish_without_reason_defaults_to_stop() {
        let event = decode_line("d:{}").unwrap();
        assert_eq!(
            event,
            Some(StreamEvent::Finish {
                reason: FinishReason::Stop
            })
        );
    }

    #[test]
    fn test_unknown_codes_and_blank_lines_are_skipped() {
        assert_eq!(decode_line("").unwrap(), None);
        assert_eq!(decode_line("   ").unwrap(), None);
        assert_eq!(decode_line(r#"e:{"finishReason":"stop"}"#).unwrap(), None);
        assert_eq!(decode_line(r#"8:[{"note":1}]"#).unwrap(), None);
    }

    #[test]
    fn test_malformed_lines_are_errors() {
        assert!(decode_line("no prefix here").is_err());
        assert!(decode_line("0:not-json").is_err());
        assert!(decode_line("9:{\"toolName\":1}").is_err());
    }

    #[test]
    fn test_drain_lines_keeps_partial_tail() {
        let mut buffer = b"0:\"a\"\r\n0:\"b\"\n0:\"c".to_vec();
        let lines = drain_lines(&mut buffer).unwrap();
        assert_eq!(lines, vec!["0:\"a\"".to_string(), "0:\"b\"".to_string()]);
        assert_eq!(buffer, b"0:\"c");
    }

    #[test]
    fn test_drain_lines_waits_for_split_character() {
        let line = "0:\"72°F\"\n".as_bytes();
        let split = line.iter().position(|b| *b == 0xC2).unwrap() + 1;

        let mut buffer = line[..split].to_vec();
        assert!(drain_lines(&mut buffer).unwrap().is_empty());

        buffer.extend_from_slice(&line[split..]);
        let lines = drain_lines(&mut buffer).unwrap();
        assert_eq!(
            decode_line(&lines[0]).unwrap(),
            Some(StreamEvent::Token("72°F".to_string()))
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_lines_rejects_invalid_utf8() {
        let mut buffer = vec![b'0', b':', 0xFF, b'\n'];
        assert!(drain_lines(&mut buffer).is_err());
    }
}
