mod slack;

pub use slack::SlackNotifier;
