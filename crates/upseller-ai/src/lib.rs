pub mod anthropic_provider;
pub mod council;
pub mod gemini_provider;
pub mod llm_factory;
pub mod llm_provider;
pub mod meta_extract;
pub mod mock_provider;
pub mod openai_llm_provider;
pub mod prompts;
pub mod retry;

pub use council::{
    AnalysisRequest, Council, CouncilError, CouncilMember, CouncilReport, CouncilSettings,
    ProviderOpinion,
};
pub use llm_factory::LLMProviderFactory;
pub use llm_provider::*;
pub use meta_extract::{ExtractionMethod, MetaAnalysis};
pub use mock_provider::{MockLLMProvider, MockReply};
