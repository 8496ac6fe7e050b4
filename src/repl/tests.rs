use super::*;
use std::sync::Mutex;

use crate::RagError;

#[test]
fn blank_lines_are_empty() {
    assert_eq!(ReplCommand::parse(""), ReplCommand::Empty);
    assert_eq!(ReplCommand::parse("   \t"), ReplCommand::Empty);
}

#[test]
fn plain_text_is_a_question() {
    assert_eq!(
        ReplCommand::parse("  How does routing work?  "),
        ReplCommand::Question("How does routing work?".to_string())
    );
}

#[test]
fn quit_commands() {
    assert_eq!(ReplCommand::parse(":quit"), ReplCommand::Quit);
    assert_eq!(ReplCommand::parse(":exit"), ReplCommand::Quit);
    assert_eq!(ReplCommand::parse(":q"), ReplCommand::Quit);
}

#[test]
fn profile_subcommands() {
    assert_eq!(
        ReplCommand::parse(":profile list"),
        ReplCommand::Profile(ProfileCommand::List)
    );
    assert_eq!(
        ReplCommand::parse(":profile show"),
        ReplCommand::Profile(ProfileCommand::Show)
    );
    assert_eq!(
        ReplCommand::parse(":profile set nextjs15-en"),
        ReplCommand::Profile(ProfileCommand::Set(Some("nextjs15-en".to_string())))
    );
    assert_eq!(
        ReplCommand::parse(":profile set all"),
        ReplCommand::Profile(ProfileCommand::Set(None))
    );
}

#[test]
fn shorthand_profile_commands() {
    assert_eq!(
        ReplCommand::parse(":list"),
        ReplCommand::Profile(ProfileCommand::List)
    );
    assert_eq!(
        ReplCommand::parse(":show"),
        ReplCommand::Profile(ProfileCommand::Show)
    );
    assert_eq!(
        ReplCommand::parse(":set nestjs11-en"),
        ReplCommand::Profile(ProfileCommand::Set(Some("nestjs11-en".to_string())))
    );
}

#[test]
fn malformed_meta_commands_show_usage() {
    for line in [":profile", ":profile set", ":profile set a b", ":profile drop", ":help", ":"] {
        assert_eq!(
            ReplCommand::parse(line),
            ReplCommand::Profile(ProfileCommand::Usage),
            "line {line:?}"
        );
    }
}

#[test]
fn session_tracks_active_profile() {
    let mut session = Session::new(None);
    assert_eq!(session.label(), "all");

    session.set_active_profile(Some("nextjs15-en".to_string()));
    assert_eq!(session.active_profile(), Some("nextjs15-en"));
    assert_eq!(session.label(), "nextjs15-en");
}

/// Records every call; questions containing "django" fail like an unknown profile
#[derive(Default)]
struct ScriptedHandler {
    questions: Mutex<Vec<(String, Option<String>)>>,
    commands: Mutex<Vec<ProfileCommand>>,
}

impl ScriptedHandler {
    fn questions(&self) -> Vec<(String, Option<String>)> {
        self.questions.lock().expect("lock").clone()
    }

    fn commands(&self) -> Vec<ProfileCommand> {
        self.commands.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ReplHandler for ScriptedHandler {
    async fn answer(&self, question: &str, profile: Option<&str>) -> Result<()> {
        self.questions
            .lock()
            .expect("lock")
            .push((question.to_string(), profile.map(str::to_string)));
        if question.contains("django") {
            return Err(RagError::UnknownProfile("django".to_string()).into());
        }
        Ok(())
    }

    fn profile_command(&self, session: &mut Session, command: ProfileCommand) -> Result<()> {
        self.commands.lock().expect("lock").push(command.clone());
        match command {
            ProfileCommand::Set(Some(name)) if name == "missing" => {
                Err(RagError::UnknownProfile(name).into())
            }
            ProfileCommand::Set(name) => {
                session.set_active_profile(name);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[tokio::test]
async fn failed_question_does_not_end_the_loop() {
    let handler = ScriptedHandler::default();
    let input: &[u8] = b"How do django views work?\nHow does routing work?\n:quit\nnever read\n";

    run(input, &handler, Session::new(Some("nextjs15-en".to_string())))
        .await
        .expect("loop should end cleanly");

    assert_eq!(
        handler.questions(),
        vec![
            (
                "How do django views work?".to_string(),
                Some("nextjs15-en".to_string())
            ),
            (
                "How does routing work?".to_string(),
                Some("nextjs15-en".to_string())
            ),
        ]
    );
}

#[tokio::test]
async fn profile_changes_apply_to_later_questions() {
    let handler = ScriptedHandler::default();
    let input: &[u8] =
        b"\n:set missing\nfirst\n:profile set nestjs11-en\nsecond\n:set all\nthird\n:q\n";

    run(input, &handler, Session::default())
        .await
        .expect("loop should end cleanly");

    assert_eq!(
        handler.questions(),
        vec![
            ("first".to_string(), None),
            ("second".to_string(), Some("nestjs11-en".to_string())),
            ("third".to_string(), None),
        ]
    );
    assert_eq!(
        handler.commands(),
        vec![
            ProfileCommand::Set(Some("missing".to_string())),
            ProfileCommand::Set(Some("nestjs11-en".to_string())),
            ProfileCommand::Set(None),
        ]
    );
}

#[tokio::test]
async fn end_of_input_ends_the_loop() {
    let handler = ScriptedHandler::default();
    let input: &[u8] = b"only question";

    run(input, &handler, Session::default())
        .await
        .expect("end of input is not an error");

    assert_eq!(handler.questions(), vec![("only question".to_string(), None)]);
}
