//! Property tests for vector index search.

use std::sync::Arc;

use docqa_rag::mock::HashEmbeddingProvider;
use docqa_rag::{Chunk, Embedder, VectorIndex};
use proptest::prelude::*;

fn chunks_from(texts: &[String]) -> Vec<Chunk> {
    texts
        .iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            id: format!("doc_{index}"),
            document_id: "doc".to_string(),
            index,
            offset: 0,
            text: text.clone(),
        })
        .collect()
}

/// Generate a non-zero embedding of the given dimension.
fn arb_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim)
        .prop_filter("non-zero embedding", |v| v.iter().any(|x| x.abs() > 1e-3))
}

/// Searching with a chunk's own embedding returns that chunk first.
mod prop_self_retrieval {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn own_embedding_ranks_first(
            texts in proptest::collection::btree_set("[a-z ]{1,40}", 1..20),
        ) {
            let texts: Vec<String> = texts.into_iter().collect();
            let rt = tokio::runtime::Runtime::new().unwrap();
            let embedder = Embedder::new(Arc::new(HashEmbeddingProvider::whole_text(32)));

            let (index, embeddings) = rt.block_on(async {
                let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                let embeddings = embedder.embed(&refs).await.unwrap();
                let index = VectorIndex::build(chunks_from(&texts), embeddings.clone()).unwrap();
                (index, embeddings)
            });

            for (text, embedding) in texts.iter().zip(&embeddings) {
                let results = index.search(embedding, 1).unwrap();
                prop_assert_eq!(&results[0].chunk.text, text);
            }
        }
    }
}

/// Results come back best first and never exceed `min(k, len)`.
mod prop_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded(
            embeddings in proptest::collection::vec(arb_embedding(DIM), 1..20),
            query in arb_embedding(DIM),
            k in 0usize..25,
        ) {
            let texts: Vec<String> = (0..embeddings.len()).map(|i| format!("chunk {i}")).collect();
            let len = embeddings.len();
            let index = VectorIndex::build(chunks_from(&texts), embeddings).unwrap();
            let results = index.search(&query, k).unwrap();

            prop_assert_eq!(results.len(), k.min(len));
            for pair in results.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
            for result in &results {
                prop_assert!(result.score >= -1.0 - 1e-5 && result.score <= 1.0 + 1e-5);
            }
        }
    }
}

#[test]
fn snapshot_survives_round_trip() {
    let texts = vec!["alpha".to_string(), "beta".to_string()];
    let index =
        VectorIndex::build(chunks_from(&texts), vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
    let json = index.to_json().unwrap();
    let restored = VectorIndex::from_json(&json).unwrap();
    assert_eq!(restored.len(), 2);
    assert_eq!(restored.search(&[0.0, 1.0], 1).unwrap()[0].chunk.text, "beta");
}
