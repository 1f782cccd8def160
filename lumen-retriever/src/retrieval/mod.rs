pub mod retriever;

pub use retriever::{NO_RESULTS_MESSAGE, PASSAGE_SEPARATOR, Phase, RetrievedPassage, Retriever};
