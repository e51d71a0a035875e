use localdoc_core::config::EmbeddingSettings;
use localdoc_embed::{default_embedder, HashEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

#[test]
fn hash_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { fake: true, fake_dim: 128, ..EmbeddingSettings::default() };
    let embedder = default_embedder(&settings).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 128, "embedding dim follows settings");
    assert_eq!(embedder.dim(), 128);

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn shared_tokens_raise_similarity() {
    let e = HashEmbedder::new(512);
    let q = e.embed_text("limited benefits");
    let a = e.embed_text("limited employee benefits policy");
    assert!(cosine(&q, &a) > 0.5, "two of four tokens shared");
    assert!(q.iter().all(|x| *x >= 0.0), "hash vectors are non-negative");
}

#[test]
fn empty_text_is_zero_vector() {
    let e = HashEmbedder::new(16);
    assert!(e.embed_text("   ").iter().all(|x| *x == 0.0));
}
