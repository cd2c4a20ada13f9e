/// Commands the view sends down to the chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Submit a message with the given body as the signed-in user.
    Send(String),
    /// Sign out, tear down the feed subscription and stop the session.
    Logout,
}
