//! Decoding of the JSON payloads Slack delivers over Socket Mode and HTTP.

use serde_json::Value;

use crate::{
    commands::SlashCommandPayload,
    events::{BlockAction, BlockActionEvent, BlockState, MessageEvent, SlackEnvelope, SlackEvent, StateValue},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketFrame {
    Hello,
    Disconnect { reason: String },
    Envelope(SlackEnvelope),
    /// Frames without an envelope id that need neither ack nor dispatch.
    Ignored { frame_type: String },
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

fn string_at(value: &Value, pointer: &str) -> String {
    str_at(value, pointer).unwrap_or_default().to_owned()
}

pub fn parse_socket_frame(frame: &Value) -> SocketFrame {
    let frame_type = str_at(frame, "/type").unwrap_or_default();
    match frame_type {
        "hello" => return SocketFrame::Hello,
        "disconnect" => {
            return SocketFrame::Disconnect {
                reason: str_at(frame, "/reason").unwrap_or("unspecified").to_owned(),
            };
        }
        _ => {}
    }

    let Some(envelope_id) = str_at(frame, "/envelope_id") else {
        return SocketFrame::Ignored { frame_type: frame_type.to_owned() };
    };
    let payload = frame.get("payload").unwrap_or(&Value::Null);
    let event = match frame_type {
        "events_api" => parse_events_api(payload),
        "slash_commands" => parse_slash_command(payload),
        "interactive" => parse_interaction(payload),
        other => SlackEvent::Unsupported { event_type: other.to_owned() },
    };

    SocketFrame::Envelope(SlackEnvelope { envelope_id: envelope_id.to_owned(), event })
}

/// Decodes an `event_callback` body. Bot-authored and edited messages are
/// reported as unsupported so the bot never answers itself.
pub fn parse_events_api(payload: &Value) -> SlackEvent {
    let event = payload.get("event").unwrap_or(&Value::Null);
    let event_type = str_at(event, "/type").unwrap_or_default();
    let message = || MessageEvent {
        channel_id: string_at(event, "/channel"),
        user_id: string_at(event, "/user"),
        text: string_at(event, "/text"),
        ts: string_at(event, "/ts"),
        thread_ts: str_at(event, "/thread_ts").map(str::to_owned),
    };

    match event_type {
        "app_mention" => SlackEvent::AppMention(message()),
        "message" if event.get("bot_id").is_none() && event.get("subtype").is_none() => {
            SlackEvent::Message(message())
        }
        "message" => SlackEvent::Unsupported { event_type: "message.bot".to_owned() },
        other => SlackEvent::Unsupported { event_type: other.to_owned() },
    }
}

pub fn parse_slash_command(payload: &Value) -> SlackEvent {
    SlackEvent::SlashCommand(SlashCommandPayload {
        command: string_at(payload, "/command"),
        text: string_at(payload, "/text"),
        channel_id: string_at(payload, "/channel_id"),
        user_id: string_at(payload, "/user_id"),
        user_name: string_at(payload, "/user_name"),
    })
}

pub fn parse_interaction(payload: &Value) -> SlackEvent {
    let interaction_type = str_at(payload, "/type").unwrap_or_default();
    if interaction_type != "block_actions" {
        return SlackEvent::Unsupported { event_type: interaction_type.to_owned() };
    }

    let actions = payload
        .get("actions")
        .and_then(Value::as_array)
        .map(|actions| actions.iter().map(parse_action).collect())
        .unwrap_or_default();

    SlackEvent::BlockAction(BlockActionEvent {
        channel_id: str_at(payload, "/channel/id")
            .or_else(|| str_at(payload, "/container/channel_id"))
            .unwrap_or_default()
            .to_owned(),
        user_id: string_at(payload, "/user/id"),
        user_name: str_at(payload, "/user/username")
            .or_else(|| str_at(payload, "/user/name"))
            .map(str::to_owned),
        message_ts: str_at(payload, "/container/message_ts").map(str::to_owned),
        actions,
        state: parse_state(payload.pointer("/state/values")),
    })
}

fn parse_action(action: &Value) -> BlockAction {
    BlockAction {
        action_id: string_at(action, "/action_id"),
        block_id: string_at(action, "/block_id"),
        value: str_at(action, "/value").map(str::to_owned),
        selected_option: str_at(action, "/selected_option/value").map(str::to_owned),
    }
}

fn parse_state(values: Option<&Value>) -> BlockState {
    let Some(blocks) = values.and_then(Value::as_object) else {
        return BlockState::new();
    };

    blocks
        .iter()
        .map(|(block_id, actions)| {
            let actions = actions
                .as_object()
                .map(|actions| {
                    actions
                        .iter()
                        .map(|(action_id, state)| {
                            let value = StateValue {
                                value: str_at(state, "/value").map(str::to_owned),
                                selected_option: str_at(state, "/selected_option/value")
                                    .map(str::to_owned),
                                selected_date: str_at(state, "/selected_date").map(str::to_owned),
                                selected_time: str_at(state, "/selected_time").map(str::to_owned),
                            };
                            (action_id.clone(), value)
                        })
                        .collect()
                })
                .unwrap_or_default();
            (block_id.clone(), actions)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_events_api, parse_interaction, parse_socket_frame, SocketFrame};
    use crate::events::SlackEvent;

    #[test]
    fn hello_and_disconnect_frames_are_control_frames() {
        assert_eq!(parse_socket_frame(&json!({"type": "hello"})), SocketFrame::Hello);
        assert_eq!(
            parse_socket_frame(&json!({"type": "disconnect", "reason": "refresh_requested"})),
            SocketFrame::Disconnect { reason: "refresh_requested".to_owned() }
        );
    }

    #[test]
    fn events_api_frame_decodes_app_mention() {
        let frame = json!({
            "type": "events_api",
            "envelope_id": "env-1",
            "payload": {
                "type": "event_callback",
                "event": {
                    "type": "app_mention",
                    "user": "U1",
                    "text": "<@UBOT> hello",
                    "channel": "C1",
                    "ts": "1730000000.0001"
                }
            }
        });

        let SocketFrame::Envelope(envelope) = parse_socket_frame(&frame) else {
            panic!("expected envelope");
        };
        assert_eq!(envelope.envelope_id, "env-1");
        let SlackEvent::AppMention(event) = envelope.event else {
            panic!("expected mention");
        };
        assert_eq!(event.channel_id, "C1");
        assert_eq!(event.text, "<@UBOT> hello");
    }

    #[test]
    fn bot_messages_are_not_dispatched_as_user_messages() {
        let payload = json!({
            "event": { "type": "message", "bot_id": "B1", "text": "reply", "channel": "C1" }
        });

        assert!(matches!(parse_events_api(&payload), SlackEvent::Unsupported { .. }));
    }

    #[test]
    fn slash_command_frame_decodes_fields() {
        let frame = json!({
            "type": "slash_commands",
            "envelope_id": "env-2",
            "payload": {
                "command": "/hello",
                "text": "team",
                "channel_id": "C2",
                "user_id": "U2",
                "user_name": "bob"
            }
        });

        let SocketFrame::Envelope(envelope) = parse_socket_frame(&frame) else {
            panic!("expected envelope");
        };
        let SlackEvent::SlashCommand(command) = envelope.event else {
            panic!("expected slash command");
        };
        assert_eq!(command.command, "/hello");
        assert_eq!(command.user_name, "bob");
    }

    #[test]
    fn block_actions_payload_decodes_actions_and_state() {
        let payload = json!({
            "type": "block_actions",
            "user": { "id": "U3", "username": "carol" },
            "channel": { "id": "C3" },
            "container": { "message_ts": "1730000000.0002" },
            "actions": [{
                "action_id": "submit_create_leave_request",
                "block_id": "submit_create_leave_request",
                "value": "submit_create_leave_request"
            }],
            "state": { "values": {
                "leave_type": {
                    "leave_type_input": { "type": "static_select", "selected_option": { "value": "39" } }
                },
                "date_pickers": {
                    "request_date_from_input": { "type": "datepicker", "selected_date": "2026-03-02" }
                },
                "time_pickers": {
                    "hour_from_input": { "type": "timepicker", "selected_time": "08:30" }
                },
                "description": {
                    "description_input": { "type": "plain_text_input", "value": "family" }
                }
            }}
        });

        let SlackEvent::BlockAction(event) = parse_interaction(&payload) else {
            panic!("expected block action");
        };
        assert_eq!(event.channel_id, "C3");
        assert_eq!(event.user_name.as_deref(), Some("carol"));
        assert_eq!(event.primary_action_id(), Some("submit_create_leave_request"));
        assert_eq!(event.selected_option("leave_type", "leave_type_input"), "39");
        assert_eq!(event.selected_date("date_pickers", "request_date_from_input"), "2026-03-02");
        assert_eq!(event.selected_time("time_pickers", "hour_from_input"), "08:30");
        assert_eq!(event.text_value("description", "description_input"), "family");
    }

    #[test]
    fn non_block_interactions_are_unsupported() {
        let payload = json!({ "type": "view_submission" });

        assert_eq!(
            parse_interaction(&payload),
            SlackEvent::Unsupported { event_type: "view_submission".to_owned() }
        );
    }
}
