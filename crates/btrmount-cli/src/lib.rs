//! Command-line client for the `btrmountd` control socket.
//!
//! The runtime splits configuration flags from the command, loads the shared
//! configuration, sends one request per invocation and renders the reply.
//! Each failure class maps to its own exit status so that scripts can tell a
//! missing service apart from a slow or confused one:
//!
//! | Status | Meaning |
//! |---|---|
//! | 0 | success |
//! | 1 | usage or configuration error |
//! | 2 | could not connect to the service |
//! | 3 | connection lost or closed without a reply |
//! | 4 | no reply within the reply window |
//! | 5 | unintelligible or unexpected reply |
//! | 6 | empty data reply |
//! | 7 | the service replied with an error |

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;

use btrmount_config::Config;
use btrmount_protocol::{Decoded, Reply};

mod command;
mod config;
mod errors;
mod output;
mod transport;

use command::{Cli, CliCommand, ExpectedReply};
use config::{ConfigLoader, OrthoConfigLoader, split_config_arguments};
pub(crate) use errors::AppError;
use output::render_listing;
use transport::{connect, exchange};

struct CliRunner<'a, W: Write, E: Write, L: ConfigLoader> {
    stdout: &'a mut W,
    stderr: &'a mut E,
    loader: &'a L,
}

impl<W, E, L> CliRunner<'_, W, E, L>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    fn run<I>(&mut self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);

        let result = Cli::try_parse_from(split.command_arguments)
            .map_err(AppError::CliUsage)
            .and_then(|cli| {
                self.loader
                    .load(&split.config_arguments)
                    .map(|config| (cli, config))
            })
            .and_then(|(cli, config)| self.execute(&cli.command, &config));

        match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(AppError::CliUsage(error))
                if matches!(error.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) =>
            {
                let _ = write!(self.stdout, "{error}");
                ExitCode::SUCCESS
            }
            Err(error) => {
                let _ = writeln!(self.stderr, "{error}");
                error.exit_code()
            }
        }
    }

    fn execute(&mut self, command: &CliCommand, config: &Config) -> Result<(), AppError> {
        let request = command.to_request()?;
        let mut connection = connect(config.daemon_socket(), config.connect_timeout())?;
        let text = exchange(&mut connection, &request.encode(), config.reply_timeout())?;
        let decoded = Reply::decode(&text)?;
        self.warn_about_skipped_lines(&decoded)?;
        self.present(command, decoded.into_message())
    }

    fn warn_about_skipped_lines(&mut self, decoded: &Decoded<Reply>) -> Result<(), AppError> {
        for issue in &decoded.issues {
            writeln!(self.stderr, "warning: skipped unintelligible reply {issue}")
                .map_err(AppError::WriteOutput)?;
        }
        Ok(())
    }

    fn present(&mut self, command: &CliCommand, reply: Reply) -> Result<(), AppError> {
        match (command.expected_reply(), reply) {
            (_, Reply::Error(description)) => Err(AppError::Service(description)),
            (ExpectedReply::Ok, Reply::Ok) => Ok(()),
            (ExpectedReply::Listing, Reply::Listing(records)) => self.write(&render_listing(&records)),
            (ExpectedReply::Listing, Reply::Detail(record)) => {
                self.write(&render_listing(std::slice::from_ref(&record)))
            }
            (_, unexpected) => Err(AppError::UnexpectedReply {
                request: command.name(),
                reply: reply_kind(&unexpected),
            }),
        }
    }

    fn write(&mut self, text: &str) -> Result<(), AppError> {
        self.stdout
            .write_all(text.as_bytes())
            .and_then(|()| self.stdout.flush())
            .map_err(AppError::WriteOutput)
    }
}

const fn reply_kind(reply: &Reply) -> &'static str {
    match reply {
        Reply::Ok => "OK",
        Reply::Listing(_) | Reply::Detail(_) => "Data",
        Reply::Error(_) => "Error",
    }
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    CliRunner {
        stdout,
        stderr,
        loader,
    }
    .run(args)
}

#[cfg(test)]
mod tests;
