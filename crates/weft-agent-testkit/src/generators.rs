//! Proptest generators for property-based testing.

use proptest::prelude::*;

use weft_agent_core::{Did, EndpointUrl, MessageBuilder, RecordId, RecordMessage, Watermark};

/// Generate a well-formed DID.
pub fn did() -> impl Strategy<Value = Did> {
    "[a-z][a-z0-9]{0,15}".prop_map(|name| {
        Did::parse(format!("did:web:{name}.example")).expect("generated DID is well-formed")
    })
}

/// Generate a well-formed endpoint URL.
pub fn endpoint_url() -> impl Strategy<Value = EndpointUrl> {
    "[a-z][a-z0-9]{0,15}".prop_map(|host| {
        EndpointUrl::parse(format!("https://{host}.example/node"))
            .expect("generated endpoint is well-formed")
    })
}

/// Generate a random RecordId.
pub fn record_id() -> impl Strategy<Value = RecordId> {
    any::<[u8; 32]>().prop_map(RecordId::from_bytes)
}

/// Generate an opaque watermark token.
pub fn watermark() -> impl Strategy<Value = Watermark> {
    "[a-z0-9-]{1,32}".prop_map(Watermark::new)
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a data format string.
pub fn data_format() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("text/plain".to_string()),
        Just("application/json".to_string()),
        Just("application/octet-stream".to_string()),
        Just("image/png".to_string()),
    ]
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=1_700_000_000_000i64
}

/// Parameters for generating a record message.
#[derive(Debug, Clone)]
pub struct MessageParams {
    /// The authoring identity.
    pub author: Did,
    /// Body format.
    pub data_format: String,
    /// Optional application schema.
    pub schema: Option<String>,
    /// Authored timestamp.
    pub timestamp: i64,
    /// The record body.
    pub payload: Vec<u8>,
}

impl Arbitrary for MessageParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            did(),
            data_format(),
            proptest::option::of("[a-z]{1,16}".prop_map(|s| format!("https://schema.example/{s}"))),
            timestamp(),
            payload(1000),
        )
            .prop_map(|(author, data_format, schema, timestamp, payload)| MessageParams {
                author,
                data_format,
                schema,
                timestamp,
                payload,
            })
            .boxed()
    }
}

/// Generate a record message (and its body) from parameters.
pub fn message_from_params(params: &MessageParams) -> (RecordMessage, Vec<u8>) {
    let mut builder = MessageBuilder::new(params.author.clone())
        .data_format(params.data_format.clone())
        .timestamp(params.timestamp);

    if let Some(schema) = &params.schema {
        builder = builder.schema(schema.clone());
    }

    (builder.body(&params.payload), params.payload.clone())
}
