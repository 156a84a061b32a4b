use crate::cli::{self, GlobalArgs};
use crate::logging::Logging;
use anyhow::Context;
use bob_core::program::ProgramBuilder;
use bob_core::{Program, ProgramOptions};
use std::ffi::OsString;

/// Run `bob` with the given arguments (including the binary name).
///
/// clap errors, including `--help` and `--version` output, are returned
/// as `clap::Error` inside the `anyhow::Error` so the caller can `exit()` them.
pub async fn run<I, T>(args: I, logging: &Logging) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    execute(args, Some(logging), |builder| builder).await
}

/// [`run`] with a hook that adjusts the program builder, without touching
/// logging.
///
/// `configure` runs once per build and the program may be built twice, so
/// commands added through it must be created inside the hook. A command
/// already bound to an earlier build fails the build.
pub async fn run_with<I, T, F>(args: I, configure: F) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
    F: Fn(ProgramBuilder) -> ProgramBuilder,
{
    execute(args, None, configure).await
}

async fn execute<I, T, F>(args: I, logging: Option<&Logging>, configure: F) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
    F: Fn(ProgramBuilder) -> ProgramBuilder,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();

    let globals = cli::bootstrap(&args);
    let mut program = build_program(&globals, &configure).await?;
    let mut matches = cli::build_cli(&program).try_get_matches_from(&args)?;

    // Global options given after the subcommand are only seen by the full parse.
    let full = cli::global_args(&matches);
    if full != globals {
        if let Some(logging) = logging.filter(|_| full.debug != globals.debug) {
            logging.set_debug(full.debug);
        }
        tracing::debug!(?full, "global options changed after full parse, rebuilding");
        program = build_program(&full, &configure).await?;
        matches = cli::build_cli(&program).try_get_matches_from(&args)?;
    }

    match matches.subcommand_name() {
        Some(name) => {
            let written = program
                .run_command(name)
                .await
                .with_context(|| format!("command '{name}' failed"))?;
            tracing::debug!(command = name, files = written, "command finished");
        }
        None => {
            cli::build_cli(&program).print_help()?;
            program.commit().context("failed to commit staged files")?;
        }
    }
    Ok(())
}

async fn build_program<F>(globals: &GlobalArgs, configure: &F) -> anyhow::Result<Program>
where
    F: Fn(ProgramBuilder) -> ProgramBuilder,
{
    let options = ProgramOptions::resolve(globals.cwd.clone(), globals.debug)
        .context("failed to resolve working directory")?;
    configure(Program::builder(options))
        .build()
        .await
        .context("failed to load bob")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bob_core::{define_command, CommandAction, ProgramContext};
    use std::path::Path;
    use tempfile::TempDir;

    struct WriteFile(&'static str, &'static str);

    #[async_trait]
    impl CommandAction for WriteFile {
        async fn execute(&self, program: &ProgramContext) -> anyhow::Result<()> {
            program
                .buffer()
                .stage(program.resolve(Path::new(self.0)), self.1);
            Ok(())
        }
    }

    struct WriteThenFail;

    #[async_trait]
    impl CommandAction for WriteThenFail {
        async fn execute(&self, program: &ProgramContext) -> anyhow::Result<()> {
            program
                .buffer()
                .stage(program.resolve(Path::new("partial.txt")), "x");
            anyhow::bail!("template handler failed")
        }
    }

    fn with_commands(builder: ProgramBuilder) -> ProgramBuilder {
        builder
            .command(define_command("hello", "Say hello", WriteFile("hello.txt", "hi")).unwrap())
            .command(define_command("broken", "Always fails", WriteThenFail).unwrap())
    }

    fn cwd(dir: &TempDir) -> String {
        dir.path().to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn dispatches_one_command_and_commits() {
        let dir = TempDir::new().unwrap();
        let root = cwd(&dir);
        run_with(["bob", "-c", root.as_str(), "hello"], with_commands)
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("hello.txt")).unwrap(),
            "hi"
        );
    }

    #[tokio::test]
    async fn cwd_after_subcommand_is_honored() {
        let dir = TempDir::new().unwrap();
        let root = cwd(&dir);
        run_with(["bob", "hello", "--cwd", root.as_str()], with_commands)
            .await
            .unwrap();
        assert!(dir.path().join("hello.txt").exists());
    }

    #[tokio::test]
    async fn failing_command_commits_nothing() {
        let dir = TempDir::new().unwrap();
        let root = cwd(&dir);
        let err = run_with(["bob", "-c", root.as_str(), "broken"], with_commands)
            .await
            .unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "command 'broken' failed: template handler failed"
        );
        assert!(!dir.path().join("partial.txt").exists());
    }

    #[tokio::test]
    async fn unknown_subcommand_is_a_clap_error() {
        let dir = TempDir::new().unwrap();
        let root = cwd(&dir);
        let err = run_with(["bob", "-c", root.as_str(), "nope"], with_commands)
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<clap::Error>().is_some());
    }

    #[tokio::test]
    async fn no_subcommand_prints_help_and_succeeds() {
        let dir = TempDir::new().unwrap();
        let root = cwd(&dir);
        run_with(["bob", "-c", root.as_str()], with_commands)
            .await
            .unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
