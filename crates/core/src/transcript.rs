use crate::PersistError;
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

pub const FEEDBACK_FILE: &str = "feedback.txt";
pub const CONVERSATION_FILE: &str = "conversation_log.txt";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const RULE_WIDTH: usize = 40;

/// Append-only text logs of conversations and user feedback. Write-only.
#[derive(Debug, Clone)]
pub struct TranscriptLog {
    folder: PathBuf,
}

impl TranscriptLog {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn record_conversation(
        &self,
        question: &str,
        bot_response: &str,
    ) -> Result<(), PersistError> {
        let entry = conversation_entry(&timestamp(), question, bot_response);
        self.append(CONVERSATION_FILE, &entry)
    }

    pub fn record_feedback(
        &self,
        feedback: &str,
        question: &str,
        bot_response: &str,
    ) -> Result<(), PersistError> {
        let entry = feedback_entry(&timestamp(), question, bot_response, feedback);
        self.append(FEEDBACK_FILE, &entry)
    }

    fn append(&self, file_name: &str, entry: &str) -> Result<(), PersistError> {
        let path = self.folder.join(file_name);
        let write_error = |source| PersistError::Write {
            path: path.display().to_string(),
            source,
        };

        fs::create_dir_all(&self.folder).map_err(write_error)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(write_error)?;
        file.write_all(entry.as_bytes()).map_err(write_error)
    }
}

fn timestamp() -> String {
    Local::now().format(TIME_FORMAT).to_string()
}

fn rule() -> String {
    "-".repeat(RULE_WIDTH)
}

fn conversation_entry(time: &str, question: &str, bot_response: &str) -> String {
    format!(
        "Time: {time}\nQuestion: {question}\nBot Response: {bot_response}\n{}\n",
        rule()
    )
}

fn feedback_entry(time: &str, question: &str, bot_response: &str, feedback: &str) -> String {
    format!(
        "Time: {time}\nQuestion: {question}\nBot Response: {bot_response}\nFeedback: {feedback}\n{}\n",
        rule()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn conversation_entry_layout() {
        let entry =
            conversation_entry("2024-05-01 10:00:00", "What is a cap?", "A series of caplets.");
        assert_eq!(
            entry,
            "Time: 2024-05-01 10:00:00\nQuestion: What is a cap?\nBot Response: A series of caplets.\n----------------------------------------\n"
        );
    }

    #[test]
    fn feedback_entry_layout() {
        let entry = feedback_entry(
            "2024-05-01 10:00:00",
            "Overall Session Feedback",
            "Overall Feedback",
            "Helpful",
        );
        assert!(entry.contains("Bot Response: Overall Feedback\nFeedback: Helpful\n"));
        assert!(entry.ends_with(&format!("{}\n", "-".repeat(40))));
    }

    #[test]
    fn entries_are_appended_and_folder_is_created() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let log = TranscriptLog::new(dir.path().join("logs"));

        log.record_conversation("q1", "a1")?;
        log.record_conversation("q2", "a2")?;
        log.record_feedback("great", "Overall Session Feedback", "Overall Feedback")?;

        let conversations = fs::read_to_string(dir.path().join("logs").join(CONVERSATION_FILE))?;
        assert_eq!(conversations.matches("Question: ").count(), 2);
        assert!(conversations.find("q1") < conversations.find("q2"));

        let feedback = fs::read_to_string(dir.path().join("logs").join(FEEDBACK_FILE))?;
        assert!(feedback.contains("Feedback: great"));
        Ok(())
    }

    #[test]
    fn unwritable_location_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let blocker = dir.path().join("not-a-folder");
        fs::write(&blocker, b"file")?;

        let log = TranscriptLog::new(&blocker);
        assert!(matches!(
            log.record_conversation("q", "a"),
            Err(PersistError::Write { .. })
        ));
        Ok(())
    }
}
