use crate::PublishError;

/// Replacement for interactive prompts.
///
/// Operations that need a human decision go through this interface; the
/// core never blocks on terminal input directly. Automated and test
/// contexts plug in a deterministic implementation
/// ([`crate::mock::ScriptedDecisions`]).
pub trait DecisionProvider {
    /// Pick exactly one of `options`.
    fn choose_one(&self, options: &[String], prompt: &str) -> Result<String, PublishError>;

    /// Pick any subset of `options`.
    fn choose_many(&self, options: &[String], prompt: &str) -> Result<Vec<String>, PublishError>;

    /// Yes/no confirmation with a default answer.
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, PublishError>;
}
