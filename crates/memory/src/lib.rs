//! Risk memory: an append-only store of past assessments, k-NN retrieval over it,
//! and the engine that blends retrieved history with a fresh model score.

pub mod embedder;
pub mod engine;
pub mod index;
pub mod model;
pub mod store;

pub use embedder::{FeatureEmbedder, FEATURE_DIMENSION};
pub use engine::{memory_score, EngineSettings, RiskAssessmentEngine};
pub use index::{cosine_distance, InMemoryVectorIndex};
pub use model::HeuristicRiskModel;
pub use store::RiskMemoryStore;
