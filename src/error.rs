use thiserror::Error;

/// Failures the extraction engine can produce.
///
/// `PhraseNotFound` and `ResponseMissing` are non-fatal outcomes the caller
/// may recover from (e.g. by prompting for a different phrase). `Parse` and
/// `Io` end the invocation. An undetermined code-block language is never an
/// error; the classifier returns [`crate::classify::Lang::Unknown`] instead.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("could not parse HTML: {0}")]
    Parse(String),

    #[error("phrase not found in any user message")]
    PhraseNotFound,

    #[error("found the question, but could not isolate the answer")]
    ResponseMissing,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
