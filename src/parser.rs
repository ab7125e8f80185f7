use crate::error::SyntaxError;
use crate::lexer;

/// Default bound on the number of arguments of a single command stage.
pub const DEFAULT_MAX_ARGS: usize = 20;

const INPUT_OP: &str = "<";
const OUTPUT_OP: &str = ">";
const APPEND_OP: &str = ">>";
const PIPE_OP: &str = "|";

/// One executable stage of a line.
///
/// `argv[0]` names the program. Redirections are optional; when an operator is
/// repeated for the same stage the last occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    pub argv: Vec<String>,
    pub input_path: Option<String>,
    pub output_path: Option<String>,
    /// `true` when `output_path` came from `>>`, `false` when it came from `>`.
    pub append: bool,
}

impl ParsedCommand {
    /// The program name, if the stage has any arguments at all.
    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    pub fn has_redirection(&self) -> bool {
        self.input_path.is_some() || self.output_path.is_some()
    }
}

/// One command, or two commands joined by a pipe.
///
/// Both stages of a piped plan are guaranteed to have a non-empty `argv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePlan {
    pub first: ParsedCommand,
    pub second: Option<ParsedCommand>,
}

impl PipelinePlan {
    pub fn is_piped(&self) -> bool {
        self.second.is_some()
    }

    /// Stages in execution order.
    pub fn commands(&self) -> impl Iterator<Item = &ParsedCommand> {
        std::iter::once(&self.first).chain(self.second.as_ref())
    }
}

struct PlanBuilder<I> {
    tokens: I,
    first: ParsedCommand,
    second: Option<ParsedCommand>,
    max_args: Option<usize>,
}

impl<I> PlanBuilder<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    fn new(tokens: I, max_args: Option<usize>) -> Self {
        PlanBuilder {
            tokens,
            first: ParsedCommand::default(),
            second: None,
            max_args,
        }
    }

    fn build_plan(mut self) -> Result<PipelinePlan, SyntaxError> {
        while let Some(token) = self.tokens.next() {
            let token = token.as_ref();
            match token {
                INPUT_OP => {
                    let path = self.tokens.next().ok_or(SyntaxError::MissingInputFile)?;
                    self.current().input_path = Some(path.as_ref().to_string());
                }
                OUTPUT_OP | APPEND_OP => {
                    let append = token == APPEND_OP;
                    let path = self
                        .tokens
                        .next()
                        .ok_or(SyntaxError::MissingOutputFile { append })?;
                    let command = self.current();
                    command.output_path = Some(path.as_ref().to_string());
                    command.append = append;
                }
                PIPE_OP => {
                    if self.second.is_some() {
                        return Err(SyntaxError::MultiplePipes);
                    }
                    self.second = Some(ParsedCommand::default());
                }
                word => self.push_argument(word)?,
            }
        }

        if self.first.argv.is_empty() {
            return Err(SyntaxError::NoCommand);
        }
        if let Some(second) = &self.second {
            if second.argv.is_empty() {
                return Err(SyntaxError::MissingCommandAfterPipe);
            }
        }

        Ok(PipelinePlan {
            first: self.first,
            second: self.second,
        })
    }

    /// The stage that redirections and arguments currently attach to.
    fn current(&mut self) -> &mut ParsedCommand {
        match &mut self.second {
            Some(second) => second,
            None => &mut self.first,
        }
    }

    fn push_argument(&mut self, word: &str) -> Result<(), SyntaxError> {
        let stage = if self.second.is_some() { 2 } else { 1 };
        let max_args = self.max_args;
        let command = self.current();
        if let Some(max) = max_args {
            if command.argv.len() >= max {
                return Err(SyntaxError::TooManyArguments { max, stage });
            }
        }
        command.argv.push(word.to_string());
        Ok(())
    }
}

/// Builds a [`PipelinePlan`] from a token sequence.
///
/// Tokens are classified left to right: `<`, `>` and `>>` consume the following
/// token as a path for the current stage, a single `|` switches to the second
/// stage, and everything else is an argument. `max_args` bounds the arguments of
/// each stage; `None` leaves them unbounded.
pub fn construct_plan<I>(tokens: I, max_args: Option<usize>) -> Result<PipelinePlan, SyntaxError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    PlanBuilder::new(tokens.into_iter(), max_args).build_plan()
}

/// Tokenizes and parses a raw line.
pub fn parse_line(line: &str, max_args: Option<usize>) -> Result<PipelinePlan, SyntaxError> {
    construct_plan(lexer::split_into_tokens(line), max_args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<PipelinePlan, SyntaxError> {
        parse_line(line, Some(DEFAULT_MAX_ARGS))
    }

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_simple_command() {
        let plan = parse("echo hi").unwrap();
        assert!(!plan.is_piped());
        assert_eq!(
            plan.first,
            ParsedCommand {
                argv: argv(&["echo", "hi"]),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_input_and_output_redirection() {
        let plan = parse("sort < in.txt > out.txt").unwrap();
        assert_eq!(plan.first.argv, argv(&["sort"]));
        assert_eq!(plan.first.input_path.as_deref(), Some("in.txt"));
        assert_eq!(plan.first.output_path.as_deref(), Some("out.txt"));
        assert!(!plan.first.append);
        assert!(plan.second.is_none());
    }

    #[test]
    fn test_append_redirection() {
        let plan = parse("echo more >> log.txt").unwrap();
        assert_eq!(plan.first.argv, argv(&["echo", "more"]));
        assert_eq!(plan.first.output_path.as_deref(), Some("log.txt"));
        assert!(plan.first.append);
    }

    #[test]
    fn test_last_redirection_wins() {
        let plan = parse("cat < a < b > c >> d").unwrap();
        assert_eq!(plan.first.input_path.as_deref(), Some("b"));
        assert_eq!(plan.first.output_path.as_deref(), Some("d"));
        assert!(plan.first.append);

        let plan = parse("cat >> c > d").unwrap();
        assert_eq!(plan.first.output_path.as_deref(), Some("d"));
        assert!(!plan.first.append);
    }

    #[test]
    fn test_redirection_may_precede_arguments() {
        let plan = parse("< in.txt sort -r").unwrap();
        assert_eq!(plan.first.argv, argv(&["sort", "-r"]));
        assert_eq!(plan.first.input_path.as_deref(), Some("in.txt"));
    }

    #[test]
    fn test_pipe_splits_into_two_commands() {
        let plan = parse("cat | wc").unwrap();
        assert!(plan.is_piped());
        assert_eq!(plan.first.argv, argv(&["cat"]));
        assert_eq!(plan.second.as_ref().unwrap().argv, argv(&["wc"]));
        assert_eq!(plan.commands().count(), 2);
    }

    #[test]
    fn test_redirections_attach_to_current_stage() {
        let plan = parse("cat < in.txt | wc -l > out.txt").unwrap();
        assert_eq!(plan.first.input_path.as_deref(), Some("in.txt"));
        assert_eq!(plan.first.output_path, None);

        let second = plan.second.unwrap();
        assert_eq!(second.argv, argv(&["wc", "-l"]));
        assert_eq!(second.input_path, None);
        assert_eq!(second.output_path.as_deref(), Some("out.txt"));
    }

    #[test]
    fn test_missing_redirection_targets() {
        assert_eq!(parse("cat <"), Err(SyntaxError::MissingInputFile));
        assert_eq!(
            parse("ls >"),
            Err(SyntaxError::MissingOutputFile { append: false })
        );
        assert_eq!(
            parse("ls >>"),
            Err(SyntaxError::MissingOutputFile { append: true })
        );
    }

    #[test]
    fn test_operator_is_consumed_as_path() {
        let plan = parse("ls > |").unwrap();
        assert_eq!(plan.first.output_path.as_deref(), Some("|"));
        assert!(!plan.is_piped());
    }

    #[test]
    fn test_empty_commands_are_rejected() {
        assert_eq!(parse(""), Err(SyntaxError::NoCommand));
        assert_eq!(parse("   "), Err(SyntaxError::NoCommand));
        assert_eq!(parse("|"), Err(SyntaxError::NoCommand));
        assert_eq!(parse("| wc"), Err(SyntaxError::NoCommand));
        assert_eq!(parse("> out.txt"), Err(SyntaxError::NoCommand));
        assert_eq!(parse("ls |"), Err(SyntaxError::MissingCommandAfterPipe));
        assert_eq!(
            parse("ls | > out.txt"),
            Err(SyntaxError::MissingCommandAfterPipe)
        );
    }

    #[test]
    fn test_second_pipe_is_rejected() {
        assert_eq!(parse("a | b | c"), Err(SyntaxError::MultiplePipes));
        assert_eq!(parse("a | b |"), Err(SyntaxError::MultiplePipes));
    }

    #[test]
    fn test_argument_limit_per_stage() {
        let twenty = vec!["x"; DEFAULT_MAX_ARGS].join(" ");
        assert!(parse(&twenty).is_ok());

        let twenty_one = format!("{} y", twenty);
        assert_eq!(
            parse(&twenty_one),
            Err(SyntaxError::TooManyArguments { max: 20, stage: 1 })
        );

        let piped = format!("cat | {}", twenty_one);
        assert_eq!(
            parse(&piped),
            Err(SyntaxError::TooManyArguments { max: 20, stage: 2 })
        );

        let both_full = format!("{} | {}", twenty, twenty);
        assert!(parse(&both_full).is_ok());
    }

    #[test]
    fn test_operators_do_not_count_as_arguments() {
        let line = format!("{} < in > out", vec!["x"; DEFAULT_MAX_ARGS].join(" "));
        assert!(parse(&line).is_ok());
    }

    #[test]
    fn test_unbounded_arguments() {
        let many = vec!["x"; 500].join(" ");
        let plan = parse_line(&many, None).unwrap();
        assert_eq!(plan.first.argv.len(), 500);

        assert_eq!(
            parse_line("a b c", Some(2)),
            Err(SyntaxError::TooManyArguments { max: 2, stage: 1 })
        );
    }

    #[test]
    fn test_construct_plan_accepts_any_token_source() {
        let plan = construct_plan(vec!["head", "-n", "1", "<", "f"], None).unwrap();
        assert_eq!(plan.first.argv, argv(&["head", "-n", "1"]));
        assert_eq!(plan.first.input_path.as_deref(), Some("f"));
    }
}
