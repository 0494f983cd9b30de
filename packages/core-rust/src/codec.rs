//! Pure envelope transformations: strip, invert, and response building.
//!
//! Every builder returns an independent copy; inputs are taken by shared
//! reference and never mutated.

use rmpv::Value;
use tracing::debug;

use crate::envelope::{Envelope, Failure, ReplyAddress, ResponseResult, Routing, Status};
use crate::error::ProtocolError;
use crate::request::Request;
use crate::version::WireFormat;

/// Name of the message field holding the request payload.
pub const REQUEST_FIELD: &str = "request";

/// Splits a raw message into its envelope and its request payload.
///
/// # Errors
///
/// - [`ProtocolError::MalformedEnvelope`] if the message is not a map, has no
///   `request` field, or its remaining fields fail the envelope schema.
/// - [`ProtocolError::MalformedRequest`] if the payload fails the request schema.
pub fn strip(message: Value) -> Result<(Envelope, Request), ProtocolError> {
    let entries = match message {
        Value::Map(entries) => entries,
        other => {
            return Err(ProtocolError::MalformedEnvelope(format!(
                "message is not a map: {other}"
            )))
        }
    };

    let mut payload = None;
    let mut rest = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        if key.as_str() == Some(REQUEST_FIELD) {
            payload = Some(value);
        } else {
            rest.push((key, value));
        }
    }

    let payload = payload.ok_or_else(|| {
        ProtocolError::MalformedEnvelope(format!("missing `{REQUEST_FIELD}` field"))
    })?;
    let envelope: Envelope = rmpv::ext::from_value(Value::Map(rest))
        .map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))?;
    let request: Request = rmpv::ext::from_value(payload)
        .map_err(|e| ProtocolError::MalformedRequest(e.to_string()))?;

    debug!(routing = ?envelope.routing, target = %request.target(), "stripped request");
    Ok((envelope, request))
}

/// Produces the reply-direction envelope for a request-direction one.
///
/// `identity` is the local reply source used by the current wire format. A
/// null `replyto` yields a forgettable envelope without consulting `version`.
/// Under the current format `replyto` is opaque: the reply always comes from
/// `identity` and the whole `replyto` value becomes the reply routing key.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedEnvelope`] if `replyto` is present but the
/// version is missing or unparseable, or if a legacy `replyto` lacks either
/// `exchange` or `routing_key`.
pub fn invert(envelope: &Envelope, identity: &Value) -> Result<Envelope, ProtocolError> {
    let (source, reply_key) = match &envelope.replyto {
        None | Some(Value::Nil) => (None, Value::Nil),
        Some(replyto) => {
            let version = envelope.version.as_deref().ok_or_else(|| {
                ProtocolError::MalformedEnvelope("replyto present without version".to_string())
            })?;
            match WireFormat::for_version(version)? {
                WireFormat::Current => (Some(identity.clone()), replyto.clone()),
                WireFormat::Legacy => match ReplyAddress::from_value(replyto) {
                    Some(address) => (Some(address.exchange), address.routing_key),
                    None => {
                        return Err(ProtocolError::MalformedEnvelope(format!(
                            "wrong replyto format: {replyto}"
                        )))
                    }
                },
            }
        }
    };

    let destination = envelope.routing.destination().cloned().unwrap_or(Value::Nil);

    let mut inverted = envelope.clone();
    inverted.routing = Routing(envelope.routing.routing_id().clone(), source);
    inverted.replyto = Some(
        ReplyAddress {
            exchange: destination,
            routing_key: reply_key,
        }
        .into_value(),
    );
    debug!(routing = ?inverted.routing, replyto = ?inverted.replyto, "inverted envelope");
    Ok(inverted)
}

/// True when the (inverted) envelope has no destination, so nothing may be sent.
#[must_use]
pub fn is_forgettable(envelope: &Envelope) -> bool {
    envelope.routing.destination().is_none()
}

/// Copy of `envelope` carrying a progress `status`.
#[must_use]
pub fn build_status(envelope: &Envelope, status: Status) -> Envelope {
    let mut out = envelope.clone();
    out.status = Some(status);
    out
}

/// Copy of `envelope` carrying `{retval}`.
#[must_use]
pub fn build_response(envelope: &Envelope, retval: Value) -> Envelope {
    let mut out = envelope.clone();
    out.result = Some(ResponseResult::Return { retval });
    out
}

/// Copy of `envelope` carrying `{exval, xstate: {trace}}`.
#[must_use]
pub fn build_exception(envelope: &Envelope, failure: &Failure) -> Envelope {
    let mut out = envelope.clone();
    out.result = Some(ResponseResult::from(failure));
    out
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn identity() -> Value {
        Value::from("rmi_agent")
    }

    fn legacy_replyto(exchange: &str, key: &str) -> Value {
        ReplyAddress {
            exchange: Value::from(exchange),
            routing_key: Value::from(key),
        }
        .into_value()
    }

    fn message(envelope_fields: Vec<(Value, Value)>) -> Value {
        let mut entries = envelope_fields;
        entries.push((
            Value::from("request"),
            Value::Map(vec![
                (Value::from("classname"), Value::from("Foo")),
                (Value::from("method"), Value::from("bar")),
                (Value::from("args"), Value::Array(vec![Value::from(1)])),
                (Value::from("kws"), Value::Map(vec![])),
            ]),
        ));
        Value::Map(entries)
    }

    // ---- strip ----

    #[test]
    fn strip_partitions_envelope_and_request() {
        let raw = message(vec![
            (
                Value::from("routing"),
                Value::Array(vec![Value::from("rid"), Value::from("agent")]),
            ),
            (Value::from("replyto"), Value::from("q")),
            (Value::from("version"), Value::from("2.0")),
            (Value::from("sn"), Value::from("abc")),
        ]);
        let (envelope, request) = strip(raw).expect("strip");
        assert_eq!(envelope.routing, Routing::new("rid", Some(Value::from("agent"))));
        assert_eq!(envelope.extra.get("sn"), Some(&Value::from("abc")));
        assert!(!envelope.extra.contains_key(REQUEST_FIELD));
        assert_eq!(request.target(), "Foo.bar");
    }

    #[test]
    fn strip_without_request_is_malformed_envelope() {
        let raw = Value::Map(vec![(
            Value::from("routing"),
            Value::Array(vec![Value::from("rid"), Value::Nil]),
        )]);
        assert!(matches!(strip(raw), Err(ProtocolError::MalformedEnvelope(_))));
    }

    #[test]
    fn strip_non_map_is_malformed_envelope() {
        assert!(matches!(
            strip(Value::from("hello")),
            Err(ProtocolError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn strip_bad_routing_is_malformed_envelope() {
        let raw = message(vec![(
            Value::from("routing"),
            Value::Array(vec![Value::from("only-one")]),
        )]);
        assert!(matches!(strip(raw), Err(ProtocolError::MalformedEnvelope(_))));
    }

    #[test]
    fn strip_three_element_routing_is_malformed_envelope() {
        let raw = message(vec![
            (
                Value::from("routing"),
                Value::Array(vec![Value::from("rid"), Value::from("agent"), Value::from("extra")]),
            ),
            (Value::from("replyto"), Value::from("q")),
            (Value::from("version"), Value::from("2.0")),
        ]);
        assert!(matches!(strip(raw), Err(ProtocolError::MalformedEnvelope(_))));
    }

    #[test]
    fn strip_bad_request_is_malformed_request() {
        let raw = Value::Map(vec![
            (
                Value::from("routing"),
                Value::Array(vec![Value::from("rid"), Value::Nil]),
            ),
            (
                Value::from("request"),
                Value::Map(vec![
                    (Value::from("classname"), Value::from("Foo")),
                    (Value::from("method"), Value::from("bar")),
                    (Value::from("args"), Value::from("not-a-list")),
                    (Value::from("kws"), Value::Map(vec![])),
                ]),
            ),
        ]);
        assert!(matches!(strip(raw), Err(ProtocolError::MalformedRequest(_))));
    }

    // ---- invert ----

    #[test]
    fn invert_current_format_synthesizes_source() {
        let env = Envelope::new(
            Routing::new("rid", Some(Value::from("agent-queue"))),
            Some(Value::from("caller-queue")),
            "2.0",
        );
        let inv = invert(&env, &identity()).expect("invert");
        assert_eq!(inv.routing, Routing::new("rid", Some(identity())));
        assert_eq!(
            inv.replyto,
            Some(legacy_replyto("agent-queue", "caller-queue"))
        );
        assert!(!is_forgettable(&inv));
    }

    #[test]
    fn invert_legacy_format_swaps_fields() {
        let env = Envelope::new(
            Routing::new("rid", Some(Value::from("agent-queue"))),
            Some(legacy_replyto("amq.direct", "caller-queue")),
            "0.5",
        );
        let inv = invert(&env, &identity()).expect("invert");
        assert_eq!(inv.routing, Routing::new("rid", Some(Value::from("amq.direct"))));
        assert_eq!(
            inv.replyto,
            Some(legacy_replyto("agent-queue", "caller-queue"))
        );
    }

    #[test]
    fn invert_legacy_without_address_fields_fails() {
        let partial = Value::Map(vec![(Value::from("queue"), Value::from("q"))]);
        let env = Envelope::new(Routing::new("rid", Some(Value::from("a"))), Some(partial), "1.0");
        assert!(matches!(
            invert(&env, &identity()),
            Err(ProtocolError::MalformedEnvelope(_))
        ));

        let opaque = Envelope::new(
            Routing::new("rid", Some(Value::from("a"))),
            Some(Value::from("q")),
            "1.0",
        );
        assert!(invert(&opaque, &identity()).is_err());
    }

    #[test]
    fn invert_null_replyto_is_forgettable() {
        let env = Envelope::new(Routing::new("rid", Some(Value::from("agent"))), None, "2.0");
        let inv = invert(&env, &identity()).expect("invert");
        assert!(is_forgettable(&inv));
        assert_eq!(inv.replyto, Some(ReplyAddress {
            exchange: Value::from("agent"),
            routing_key: Value::Nil,
        }.into_value()));
    }

    #[test]
    fn invert_null_replyto_ignores_version() {
        let mut env = Envelope::new(Routing::new("rid", Some(Value::from("agent"))), None, "x");
        assert!(invert(&env, &identity()).is_ok());
        env.version = None;
        assert!(invert(&env, &identity()).is_ok());
    }

    #[test]
    fn invert_replyto_without_version_fails() {
        let mut env = Envelope::new(
            Routing::new("rid", Some(Value::from("agent"))),
            Some(Value::from("q")),
            "2.0",
        );
        env.version = None;
        assert!(matches!(
            invert(&env, &identity()),
            Err(ProtocolError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn invert_twice_restores_legacy_envelope() {
        let env = Envelope::new(
            Routing::new("rid", Some(Value::from("agent-queue"))),
            Some(legacy_replyto("amq.direct", "caller-queue")),
            "0.5",
        );
        let twice = invert(&invert(&env, &identity()).expect("once"), &identity()).expect("twice");
        assert_eq!(twice.routing, env.routing);
        assert_eq!(twice.replyto, env.replyto);
    }

    #[test]
    fn invert_twice_keeps_current_reply_source() {
        let env = Envelope::new(
            Routing::new("rid", Some(Value::from("agent-queue"))),
            Some(Value::from("caller-queue")),
            "2.0",
        );
        let once = invert(&env, &identity()).expect("once");
        let twice = invert(&once, &identity()).expect("twice");

        // The reply source is always the local identity; the previous reply
        // address is carried whole as the new routing key.
        assert_eq!(twice.routing, Routing::new("rid", Some(identity())));
        assert_eq!(twice.routing, once.routing);
        let address = ReplyAddress::from_value(twice.replyto.as_ref().expect("replyto"))
            .expect("address");
        assert_eq!(address.exchange, identity());
        assert_eq!(Some(address.routing_key), once.replyto);
    }

    #[test]
    fn invert_current_treats_address_shaped_replyto_as_opaque() {
        let replyto = legacy_replyto("x-ex", "k");
        let env = Envelope::new(
            Routing::new("rid", Some(Value::from("agent"))),
            Some(replyto.clone()),
            "2.0",
        );
        let inv = invert(&env, &identity()).expect("invert");
        assert_eq!(inv.routing.destination(), Some(&identity()));
        let address = ReplyAddress::from_value(inv.replyto.as_ref().expect("replyto"))
            .expect("address");
        assert_eq!(address.exchange, Value::from("agent"));
        assert_eq!(address.routing_key, replyto);
    }

    #[test]
    fn invert_does_not_touch_input() {
        let env = Envelope::new(
            Routing::new("rid", Some(Value::from("agent"))),
            Some(Value::from("q")),
            "2.1",
        );
        let before = env.clone();
        let _ = invert(&env, &identity()).expect("invert");
        assert_eq!(env, before);
    }

    // ---- builders ----

    #[test]
    fn builders_copy_and_populate() {
        let env = Envelope::new(Routing::new("rid", Some(Value::from("d"))), None, "2.0");
        let before = env.clone();

        let status = build_status(&env, Status::Started);
        assert_eq!(status.status, Some(Status::Started));
        assert!(status.result.is_none());

        let response = build_response(&env, Value::from(42));
        assert_eq!(
            response.result,
            Some(ResponseResult::Return { retval: Value::from(42) })
        );

        let failure = Failure {
            message: "x".to_string(),
            trace: "trace".to_string(),
        };
        let exception = build_exception(&env, &failure);
        assert!(matches!(
            exception.result,
            Some(ResponseResult::Exception { ref exval, .. }) if exval == "x"
        ));

        assert_eq!(env, before);
        assert!(env.status.is_none() && env.result.is_none());
    }

    // ---- properties ----

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            "[a-z.]{1,12}".prop_map(Value::from),
        ]
    }

    proptest! {
        #[test]
        fn legacy_inversion_is_an_involution(
            rid in scalar(),
            dest in scalar(),
            exchange in scalar(),
            key in scalar(),
        ) {
            let replyto = ReplyAddress { exchange, routing_key: key }.into_value();
            let env = Envelope::new(Routing(rid, Some(dest)), Some(replyto), "1.0");
            let twice = invert(&invert(&env, &identity()).unwrap(), &identity()).unwrap();
            prop_assert_eq!(twice.routing, env.routing);
            prop_assert_eq!(twice.replyto, env.replyto);
        }

        #[test]
        fn builders_never_mutate(rid in scalar(), retval in scalar(), msg in "[ -~]{0,24}") {
            let env = Envelope::new(Routing(rid, None), None, "2.0");
            let before = env.clone();
            let _ = build_status(&env, Status::Progress);
            let _ = build_response(&env, retval);
            let _ = build_exception(&env, &Failure { message: msg, trace: String::new() });
            prop_assert_eq!(env, before);
        }

        #[test]
        fn forgettable_iff_no_reply_destination(rid in scalar(), dest in scalar(), null_reply in any::<bool>()) {
            let replyto = if null_reply { None } else { Some(Value::from("q")) };
            let env = Envelope::new(Routing(rid, Some(dest)), replyto, "2.0");
            let inv = invert(&env, &identity()).unwrap();
            prop_assert_eq!(is_forgettable(&inv), null_reply);
        }
    }
}
