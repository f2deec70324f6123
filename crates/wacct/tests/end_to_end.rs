//! End-to-end runs against a scratch corpus.
//!
//! Backends are stood in for by `sh`: each `.c` file is a shell script
//! whose exit status is the program's termination code, and the
//! "simulator compile" step copies it into the image, optionally
//! prefixing `SIM=1` so a test can behave differently on the potato CPU.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use libtest_mimic::{Arguments, Failed, Trial};
use tempfile::TempDir;
use wacct::{
    Builder, CancelToken, ChapterId, CommandBuildSystem, CommandLine, DiffRunner, HarnessConfig,
    HarnessError, NoProgress, RunOptions,
};

const MAX_TEST_THREADS: usize = 4;

fn main() {
    let mut args = Arguments::from_args();
    let requested = args.test_threads.unwrap_or(MAX_TEST_THREADS);
    args.test_threads = Some(requested.min(MAX_TEST_THREADS));

    let no_shell = !Path::new("/bin/sh").exists();
    let trials = vec![
        Trial::test("agreeing_chapter_passes", agreeing_chapter_passes),
        Trial::test("divergence_is_reported", divergence_is_reported),
        Trial::test("keep_going_reports_all", keep_going_reports_all),
        Trial::test("failing_build_runs_no_tests", failing_build_runs_no_tests),
        Trial::test("missing_chapter_fails_before_build", missing_chapter_fails_before_build),
        Trial::test("parallel_run_agrees", parallel_run_agrees),
        Trial::test("cli_diff_exit_codes", cli_diff_exit_codes),
        Trial::test("cli_diff_builds_once", cli_diff_builds_once),
        Trial::test("cli_list_prints_paths", cli_list_prints_paths),
        Trial::test("cli_run_single_file", cli_run_single_file),
        Trial::test("cli_run_truncates_exit_codes", cli_run_truncates_exit_codes),
    ]
    .into_iter()
    .map(|trial| trial.with_ignored_flag(no_shell))
    .collect();

    libtest_mimic::run(&args, trials).exit();
}

/// Scratch corpus plus the tool scripts that drive it.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Result<Self, Failed> {
        let dir = tempfile::tempdir().map_err(|e| Failed::from(format!("tempdir: {e}")))?;
        let fixture = Self { dir };
        fixture.write("tools/compile.sh", "{ echo SIM=1; cat \"$1\"; } > \"$3\"\n")?;
        Ok(fixture)
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn corpus(&self) -> PathBuf {
        self.root().join("corpus")
    }

    fn write(&self, relative: &str, contents: &str) -> Result<PathBuf, Failed> {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Failed::from(format!("mkdir: {e}")))?;
        }
        fs::write(&path, contents).map_err(|e| Failed::from(format!("write: {e}")))?;
        Ok(path)
    }

    /// Add a valid test that exits with `native` natively and `simulated` on the simulator.
    fn add_test(&self, chapter: u32, name: &str, native: i32, simulated: i32) -> Result<PathBuf, Failed> {
        let script = if native == simulated {
            format!("exit {native}\n")
        } else {
            format!("[ -n \"$SIM\" ] && exit {simulated}\nexit {native}\n")
        };
        self.write(&format!("corpus/tests/chapter_{chapter}/valid/{name}"), &script)
    }

    fn compile_script(&self) -> String {
        self.root().join("tools/compile.sh").display().to_string()
    }

    fn config(&self, build: &str) -> Result<HarnessConfig, Failed> {
        let build: CommandLine = build.parse().map_err(|e| Failed::from(format!("{e}")))?;
        Ok(HarnessConfig::default()
            .with_corpus_root(self.corpus())
            .with_compiler_dir(self.root())
            .with_binary("sh")
            .with_build_command(build)
            .with_sim_compile(CommandLine::new("sh").with_arg(self.compile_script()))
            .with_sim_execute(CommandLine::new("sh")))
    }
}

fn chapters(ids: &[u32]) -> Vec<ChapterId> {
    ids.iter().filter_map(|&n| ChapterId::new(n)).collect()
}

fn run_diff(config: &HarnessConfig, ids: &[u32], options: &RunOptions) -> wacct::Result<wacct::RunReport> {
    let corpus = config.corpus();
    let native = config.native_backend();
    let simulated = config.simulated_backend();
    let mut builder = Builder::new(CommandBuildSystem::from_config(config));
    let mut runner = DiffRunner::new(&corpus, &native, &simulated, &NoProgress, CancelToken::new());
    runner.run(&mut builder, &chapters(ids), options)
}

fn agreeing_chapter_passes() -> Result<(), Failed> {
    let fixture = Fixture::new()?;
    fixture.add_test(1, "return_2.c", 2, 2)?;
    fixture.add_test(1, "return_0.c", 0, 0)?;
    fixture.add_test(1, "return_255.c", 255, 255)?;
    fixture.write("corpus/tests/chapter_1/valid/README", "not a test\n")?;

    let report = run_diff(&fixture.config("true")?, &[1], &RunOptions::default())
        .map_err(|e| Failed::from(format!("run failed: {e}")))?;
    if report.total != 3 || report.passed != 3 {
        return Err(format!("unexpected report {report:?}").into());
    }
    Ok(())
}

fn divergence_is_reported() -> Result<(), Failed> {
    let fixture = Fixture::new()?;
    fixture.add_test(1, "a.c", 1, 1)?;
    fixture.add_test(1, "b.c", 2, 3)?;
    fixture.add_test(1, "c.c", 4, 5)?;

    match run_diff(&fixture.config("true")?, &[1], &RunOptions::default()) {
        Err(HarnessError::Divergence(divergence)) => {
            if divergence.case.file_name != "b.c"
                || divergence.native.0 != 2
                || divergence.simulated.0 != 3
            {
                return Err(format!("wrong divergence: {divergence}").into());
            }
            Ok(())
        }
        other => Err(format!("expected a divergence, got {other:?}").into()),
    }
}

fn keep_going_reports_all() -> Result<(), Failed> {
    let fixture = Fixture::new()?;
    fixture.add_test(1, "a.c", 1, 1)?;
    fixture.add_test(1, "b.c", 2, 3)?;
    fixture.add_test(2, "c.c", 4, 5)?;

    let options = RunOptions::default().with_keep_going(true);
    match run_diff(&fixture.config("true")?, &[1, 2], &options) {
        Err(HarnessError::Divergences(divergences)) => {
            let names: Vec<&str> = divergences
                .iter()
                .map(|d| d.case.file_name.as_str())
                .collect();
            if names != ["b.c", "c.c"] {
                return Err(format!("wrong divergences: {names:?}").into());
            }
            Ok(())
        }
        other => Err(format!("expected divergences, got {other:?}").into()),
    }
}

fn failing_build_runs_no_tests() -> Result<(), Failed> {
    let fixture = Fixture::new()?;
    fixture.add_test(1, "return_2.c", 2, 2)?;
    let script = fixture.write("tools/build.sh", "echo building; echo broken >&2; exit 1\n")?;
    // A binary that cannot launch: any adapter call would surface as a launch error
    let config = fixture
        .config(&format!("sh {}", script.display()))?
        .with_binary(fixture.root().join("no-such-compiler"));

    match run_diff(&config, &[1], &RunOptions::default()) {
        Err(HarnessError::BuildFailure {
            code: Some(1),
            stdout,
            stderr,
        }) => {
            if !stdout.contains("building") || !stderr.contains("broken") {
                return Err(format!("streams not captured: {stdout:?} / {stderr:?}").into());
            }
            Ok(())
        }
        other => Err(format!("expected a build failure, got {other:?}").into()),
    }
}

fn missing_chapter_fails_before_build() -> Result<(), Failed> {
    let fixture = Fixture::new()?;
    fixture.add_test(1, "return_2.c", 2, 2)?;
    let marker = fixture.root().join("built");
    let build = format!(
        "sh {}",
        fixture
            .write("tools/build.sh", &format!("touch {}\n", marker.display()))?
            .display()
    );
    let config = fixture.config(&build)?;

    match run_diff(&config, &[1, 7], &RunOptions::default()) {
        Err(e) if e.is_corpus_not_found() => {}
        other => return Err(format!("expected a missing corpus, got {other:?}").into()),
    }
    if marker.exists() {
        return Err("build ran before the corpus was checked".into());
    }
    Ok(())
}

fn parallel_run_agrees() -> Result<(), Failed> {
    let fixture = Fixture::new()?;
    for i in 0..12 {
        fixture.add_test(1, &format!("t{i:02}.c"), i, i)?;
    }

    let options = RunOptions::default().with_jobs(4);
    let report = run_diff(&fixture.config("true")?, &[1], &options)
        .map_err(|e| Failed::from(format!("run failed: {e}")))?;
    if report.passed != 12 {
        return Err(format!("unexpected report {report:?}").into());
    }
    Ok(())
}

fn wacct(fixture: &Fixture) -> Command {
    wacct_building_with(fixture, "true")
}

fn wacct_building_with(fixture: &Fixture, build: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_wacct"));
    cmd.arg("--silent")
        .arg("--corpus")
        .arg(fixture.corpus())
        .arg("--binary")
        .arg("sh")
        .arg("--build-cmd")
        .arg(build)
        .arg("--sim-compile-cmd")
        .arg(format!("sh {}", fixture.compile_script()))
        .arg("--sim-exec-cmd")
        .arg("sh");
    cmd
}

fn cli_diff_exit_codes() -> Result<(), Failed> {
    let fixture = Fixture::new()?;
    fixture.add_test(1, "return_2.c", 2, 2)?;
    fixture.add_test(2, "mismatch.c", 6, 7)?;

    let status = wacct(&fixture)
        .args(["diff", "1"])
        .status()
        .map_err(|e| Failed::from(format!("spawn: {e}")))?;
    if !status.success() {
        return Err(format!("chapter 1 should pass, got {status}").into());
    }

    let output = wacct(&fixture)
        .args(["diff", "--all"])
        .output()
        .map_err(|e| Failed::from(format!("spawn: {e}")))?;
    if output.status.code() != Some(1) {
        return Err(format!("--all should fail, got {}", output.status).into());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.contains("mismatch.c") {
        return Err(format!("divergence not reported: {stderr}").into());
    }
    Ok(())
}

fn cli_diff_builds_once() -> Result<(), Failed> {
    let fixture = Fixture::new()?;
    fixture.add_test(1, "return_2.c", 2, 2)?;
    fixture.add_test(2, "return_3.c", 3, 3)?;
    let log = fixture.root().join("builds.log");
    let script = fixture.write("tools/build.sh", &format!("echo built >> {}\n", log.display()))?;

    let status = wacct_building_with(&fixture, &format!("sh {}", script.display()))
        .args(["diff", "1", "2", "--force-rebuild"])
        .status()
        .map_err(|e| Failed::from(format!("spawn: {e}")))?;
    if !status.success() {
        return Err(format!("diff should pass, got {status}").into());
    }
    let builds = fs::read_to_string(&log).map_err(|e| Failed::from(format!("read log: {e}")))?;
    if builds.lines().count() != 1 {
        return Err(format!("expected one build, log was {builds:?}").into());
    }
    Ok(())
}

fn cli_list_prints_paths() -> Result<(), Failed> {
    let fixture = Fixture::new()?;
    fixture.add_test(1, "return_2.c", 2, 2)?;
    fixture.add_test(3, "add.c", 3, 3)?;

    let output = wacct(&fixture)
        .arg("list")
        .output()
        .map_err(|e| Failed::from(format!("spawn: {e}")))?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    if !output.status.success()
        || lines.len() != 2
        || !lines[0].ends_with("chapter_1/valid/return_2.c")
        || !lines[1].ends_with("chapter_3/valid/add.c")
    {
        return Err(format!("unexpected listing: {stdout}").into());
    }
    Ok(())
}

fn cli_run_single_file() -> Result<(), Failed> {
    let fixture = Fixture::new()?;
    let same = fixture.add_test(1, "same.c", 9, 9)?;
    let different = fixture.add_test(1, "different.c", 9, 10)?;

    let output = wacct(&fixture)
        .arg("run")
        .arg(&same)
        .output()
        .map_err(|e| Failed::from(format!("spawn: {e}")))?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !output.status.success() || !stdout.contains("native:    9") {
        return Err(format!("run of agreeing file failed: {stdout}").into());
    }

    let status = wacct(&fixture)
        .arg("run")
        .arg(&different)
        .status()
        .map_err(|e| Failed::from(format!("spawn: {e}")))?;
    if status.code() != Some(1) {
        return Err(format!("disagreeing file should fail, got {status}").into());
    }
    Ok(())
}

fn cli_run_truncates_exit_codes() -> Result<(), Failed> {
    let fixture = Fixture::new()?;
    // The simulator reports 258 on stdout; natively the process exits 2
    let source = fixture.write(
        "wide.c",
        "[ -n \"$SIM\" ] && { echo 258; exit 0; }\nexit 2\n",
    )?;

    let raw = wacct(&fixture)
        .args(["--sim-result", "stdout", "run"])
        .arg(&source)
        .status()
        .map_err(|e| Failed::from(format!("spawn: {e}")))?;
    if raw.code() != Some(1) {
        return Err(format!("raw comparison should fail, got {raw}").into());
    }

    let truncated = wacct(&fixture)
        .args(["--sim-result", "stdout", "run", "--truncate-exit-codes"])
        .arg(&source)
        .status()
        .map_err(|e| Failed::from(format!("spawn: {e}")))?;
    if !truncated.success() {
        return Err(format!("truncated comparison should pass, got {truncated}").into());
    }
    Ok(())
}
