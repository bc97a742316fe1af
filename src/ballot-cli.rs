//! A terminal front end for the ballot form.
//! It talks to a running ballot server over the same API the web form uses.

use clap::{Arg, ArgAction, ArgMatches, Command};

use ballot_backend::client::{
    BallotApi, BallotForm, HttpBallotApi, Intent, Notice, SubmitOutcome,
    DEFAULT_API_URL,
};

const PROGRAM_NAME: &str = "ballot-cli";

const ABOUT_TEXT: &str = "Cast a ballot with a ballot server.

EXIT CODES:
     0: Success.
     1: Error, e.g. the server could not be reached.
     2: The ballot was incomplete or rejected.";

const URL: &str = "URL";
const NATIONAL_ID: &str = "NATIONAL_ID";
const BALLOT_NUMBER: &str = "BALLOT_NUMBER";
const CANDIDATE: &str = "CANDIDATE";
const COMMENTS: &str = "COMMENTS";

const CANDIDATES_CMD: &str = "candidates";
const VOTE_CMD: &str = "vote";

const EXIT_OK: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_REJECTED: i32 = 2;

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .subcommand_required(true)
        .arg(
            Arg::new(URL)
                .long("url")
                .help("Root of the ballot server's API")
                .action(ArgAction::Set)
                .default_value(DEFAULT_API_URL)
                .global(true),
        )
        .subcommand(Command::new(CANDIDATES_CMD).about("List the candidates on the ballot"))
        .subcommand(
            Command::new(VOTE_CMD)
                .about("Cast a ballot")
                .arg(
                    Arg::new(NATIONAL_ID)
                        .long("national-id")
                        .help("Your National ID")
                        .action(ArgAction::Set)
                        .required(true),
                )
                .arg(
                    Arg::new(BALLOT_NUMBER)
                        .long("ballot-number")
                        .help("The ballot number you were issued")
                        .action(ArgAction::Set)
                        .required(true),
                )
                .arg(
                    Arg::new(CANDIDATE)
                        .long("candidate")
                        .help("ID of the candidate to vote for, as listed by `candidates`")
                        .action(ArgAction::Set)
                        .required(true),
                )
                .arg(
                    Arg::new(COMMENTS)
                        .long("comments")
                        .help("Optional comments for the election officials")
                        .action(ArgAction::Set)
                        .default_value(""),
                ),
        )
}

fn print_notice(notice: &Notice) {
    let tag = match notice.intent {
        Intent::Primary => "info",
        Intent::Success => "ok",
        Intent::Warning => "warning",
        Intent::Danger => "error",
    };
    match notice.intent {
        Intent::Danger | Intent::Warning => eprintln!("[{tag}] {}", notice.message),
        Intent::Primary | Intent::Success => println!("[{tag}] {}", notice.message),
    }
}

fn print_notices<A: BallotApi>(form: &mut BallotForm<A>) {
    for notice in form.take_notices() {
        print_notice(&notice);
    }
}

async fn list_candidates<A: BallotApi>(form: &mut BallotForm<A>) -> i32 {
    let result = form.load_candidates().await.map(|candidates| {
        for candidate in candidates {
            println!("{:>4}  {}", candidate.candidate_id, candidate.name);
        }
    });
    print_notices(form);
    match result {
        Ok(()) => EXIT_OK,
        Err(_) => EXIT_ERROR,
    }
}

async fn vote<A: BallotApi>(form: &mut BallotForm<A>, args: &ArgMatches) -> i32 {
    let get = |id: &str| args.get_one::<String>(id).cloned().unwrap_or_default();

    if form.load_candidates().await.is_err() {
        print_notices(form);
        return EXIT_ERROR;
    }
    form.set_national_id(get(NATIONAL_ID));
    form.set_ballot_number(get(BALLOT_NUMBER));
    form.set_comments(get(COMMENTS));
    let candidate = get(CANDIDATE);
    if let Err(e) = form.select_candidate(&candidate) {
        eprintln!("[error] {e}");
        return EXIT_REJECTED;
    }

    let result = form.submit().await;
    print_notices(form);
    match result {
        Ok(SubmitOutcome::Cast) => EXIT_OK,
        Ok(SubmitOutcome::Incomplete | SubmitOutcome::Rejected(_)) => EXIT_REJECTED,
        Err(_) => EXIT_ERROR,
    }
}

/// Run the CLI with the given args, returning the exit code.
fn run(args: &ArgMatches) -> i32 {
    let url = args
        .get_one::<String>(URL)
        .map(String::as_str)
        .unwrap_or(DEFAULT_API_URL);
    let api = match HttpBallotApi::new(url) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("[error] {e}");
            return EXIT_ERROR;
        }
    };
    let runtime = match rocket::tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("[error] Failed to start async runtime: {e}");
            return EXIT_ERROR;
        }
    };

    let mut form = BallotForm::new(api);
    runtime.block_on(async {
        match args.subcommand() {
            Some((CANDIDATES_CMD, _)) => list_candidates(&mut form).await,
            Some((VOTE_CMD, vote_args)) => vote(&mut form, vote_args).await,
            _ => EXIT_ERROR,
        }
    })
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn vote_arguments() {
        let args = cli()
            .try_get_matches_from([
                PROGRAM_NAME,
                "--url",
                "http://localhost:8000/api",
                VOTE_CMD,
                "--national-id",
                "111111111",
                "--ballot-number",
                "$argon2i$v=19$m=4096,t=3,p=1$c2FsdA$aGFzaA",
                "--candidate",
                "2",
            ])
            .unwrap();
        assert_eq!(
            args.get_one::<String>(URL).unwrap(),
            "http://localhost:8000/api"
        );
        let (name, vote_args) = args.subcommand().unwrap();
        assert_eq!(name, VOTE_CMD);
        assert_eq!(vote_args.get_one::<String>(NATIONAL_ID).unwrap(), "111111111");
        assert_eq!(vote_args.get_one::<String>(CANDIDATE).unwrap(), "2");
        assert_eq!(vote_args.get_one::<String>(COMMENTS).unwrap(), "");
    }

    #[test]
    fn defaults_and_requirements() {
        let args = cli()
            .try_get_matches_from([PROGRAM_NAME, CANDIDATES_CMD])
            .unwrap();
        assert_eq!(args.get_one::<String>(URL).unwrap(), DEFAULT_API_URL);

        assert!(cli().try_get_matches_from([PROGRAM_NAME]).is_err());
        assert!(cli()
            .try_get_matches_from([PROGRAM_NAME, VOTE_CMD, "--national-id", "1"])
            .is_err());
    }

    #[test]
    fn unreachable_server_is_an_error() {
        let args = cli()
            .try_get_matches_from([PROGRAM_NAME, "--url", "http://127.0.0.1:1/api", CANDIDATES_CMD])
            .unwrap();
        assert_eq!(run(&args), EXIT_ERROR);
    }
}
