// Screening pipeline: resume uploads in, fitment analyses out.
// upload -> extractor -> scorer (prompts, analysis, pricing) -> audit,
// driven per request by batch and exposed over HTTP by handlers.
pub mod analysis;
pub mod audit;
pub mod batch;
pub mod extractor;
pub mod handlers;
pub mod pricing;
pub mod prompts;
pub mod scorer;
pub mod upload;
