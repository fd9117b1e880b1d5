//! Shared fetch-driving helpers for the integration suites.

use std::sync::Arc;

use tokio::sync::mpsc;

use trellis_model::Node;
use trellis_store::{
    CancelToken, FetchReplyData, FetchRequest, MemoryStore, Processor, ProcessorConfig, Query,
};
use trellis_testkit::NOW_MS;

/// Install the test subscriber once; `RUST_LOG` controls verbosity.
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Run a query to completion, returning `(nodes, embed)` in emission order.
pub async fn run_fetch(store: &Arc<MemoryStore>, query: Query) -> (Vec<Node>, Vec<Node>) {
    init_tracing();
    let processor = Processor::new(Arc::clone(store), ProcessorConfig::default()).unwrap();
    let (tx, mut rx) = mpsc::channel::<FetchReplyData>(8);
    let cancel = CancelToken::new();
    let request = FetchRequest { query };

    let collector = async {
        let mut nodes = Vec::new();
        let mut embed = Vec::new();
        let mut finished = false;
        while let Some(batch) = rx.recv().await {
            if batch.is_final() {
                finished = true;
                break;
            }
            nodes.extend(batch.nodes);
            embed.extend(batch.embed);
        }
        (nodes, embed, finished)
    };

    let (result, (nodes, embed, finished)) =
        tokio::join!(processor.fetch(&request, NOW_MS, &cancel, &tx), collector);
    result.expect("fetch");
    assert!(finished, "fetch must close with an empty batch");
    (nodes, embed)
}

/// Data payloads of the emitted nodes, for order-sensitive assertions.
pub fn payloads(nodes: &[Node]) -> Vec<Vec<u8>> {
    nodes
        .iter()
        .filter_map(|n| n.data().map(<[u8]>::to_vec))
        .collect()
}
