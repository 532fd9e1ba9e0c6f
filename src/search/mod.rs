pub mod vector;

pub use vector::{cosine_similarity, top_k};
