//! Tags large shuffle edges with a decoder that skips deserialization.

use crate::graph::{AttributeKey, CommunicationPattern, Dag, Decoder};
use crate::pass::AnnotatingPass;

/// For every edge whose *CommunicationPattern* attribute is *Shuffle*,
/// overwrites its *Decoder* attribute with [`Decoder::BytesDecoder`] — the
/// executor reads such edges as raw bytes instead of deserializing them,
/// enabling a relay-transform optimization downstream. Non-shuffle edges are
/// untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct LargeShuffleDecoderPass;

const READ_SET: [AttributeKey; 1] = [AttributeKey::CommunicationPattern];

impl AnnotatingPass for LargeShuffleDecoderPass {
    fn read_set(&self) -> &[AttributeKey] {
        &READ_SET
    }

    fn write_attribute(&self) -> AttributeKey {
        AttributeKey::Decoder
    }

    fn apply(&self, mut dag: Dag) -> Dag {
        let mut tagged = 0usize;
        for edge in dag.edges.values_mut() {
            if edge.attributes.communication_pattern() == Some(CommunicationPattern::Shuffle) {
                edge.attributes.set_decoder(Decoder::BytesDecoder);
                tagged += 1;
            }
        }
        tracing::debug!(tagged, "large shuffle decoder pass applied");
        dag
    }
}
