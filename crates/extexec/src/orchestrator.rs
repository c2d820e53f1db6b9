//! Orchestrator - runs one lifecycle verb end to end
//!
//! `Init → Staged → Executed → ResultsRead → Closed`. Any stage reporting an
//! error skips straight to `Closed`; closing the staging area happens on
//! every path and its diagnostics are appended after everything else.

use crate::cancel::RunContext;
use crate::command;
use crate::diag::Diagnostics;
use crate::env;
use crate::error::Error;
use crate::record::ResourceData;
use crate::result::ResultReader;
use crate::settings::Settings;
use crate::staging::{StagingArea, StagingFile};
use crate::types::{ProgramSpec, ProviderConfig, Verb};

/// Progress of one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Staged,
    Executed,
    ResultsRead,
    Closed,
}

/// Engine bound to one provider instance
///
/// Holds no mutable state, so one engine can serve operations on many
/// threads at once.
#[derive(Debug, Clone)]
pub struct Engine {
    pub settings: Settings,
    pub provider: ProviderConfig,
}

impl Engine {
    pub fn new(settings: Settings, provider: ProviderConfig) -> Self {
        Self { settings, provider }
    }

    /// Run `program` for `verb` against `data`
    pub fn run(
        &self,
        ctx: &RunContext,
        data: &mut dyn ResourceData,
        verb: Verb,
        program: &ProgramSpec,
    ) -> Diagnostics {
        run_program(ctx, &self.settings, &self.provider, data, verb, program)
    }
}

/// Stage, execute, read back and clean up for one lifecycle verb
pub fn run_program(
    ctx: &RunContext,
    settings: &Settings,
    provider: &ProviderConfig,
    data: &mut dyn ResourceData,
    verb: Verb,
    program: &ProgramSpec,
) -> Diagnostics {
    let ctx = match settings.timeout {
        Some(timeout) => ctx.clone().with_timeout(timeout),
        None => ctx.clone(),
    };

    let mut run = Run {
        verb,
        phase: Phase::Init,
    };
    let files = StagingFile::set_for(data, provider);
    let mut area = StagingArea::new(settings.staging_base.clone(), files);

    let mut diags = run.stage_and_execute(&ctx, settings, data, program, &mut area);
    diags.extend(area.close());
    run.advance(Phase::Closed);

    log::debug!(
        "{verb} finished with {} error(s), {} warning(s)",
        diags.errors().count(),
        diags.warnings().count()
    );
    diags
}

struct Run {
    verb: Verb,
    phase: Phase,
}

impl Run {
    fn advance(&mut self, next: Phase) {
        log::trace!("{}: {:?} -> {:?}", self.verb, self.phase, next);
        self.phase = next;
    }

    fn stage_and_execute(
        &mut self,
        ctx: &RunContext,
        settings: &Settings,
        data: &mut dyn ResourceData,
        program: &ProgramSpec,
        area: &mut StagingArea,
    ) -> Diagnostics {
        let mut diags = area.open();
        if diags.has_error() {
            return diags;
        }
        self.advance(Phase::Staged);

        let child_env = match env::build(&settings.base_env, &settings.prefix, area) {
            Ok(child_env) => child_env,
            Err(err) => {
                diags.push(err);
                return diags;
            }
        };
        diags.extend(command::run(ctx, program, &child_env));
        if diags.has_error() {
            return diags;
        }
        self.advance(Phase::Executed);

        let Some(dir) = area.path() else {
            diags.push(Error::NotStaged);
            return diags;
        };
        let reader = ResultReader::new(dir, self.verb);

        diags.extend(reader.read_id(data));
        if diags.has_error() {
            return diags;
        }
        diags.extend(reader.read_state(data));
        if diags.has_error() {
            return diags;
        }
        if settings.outputs {
            diags.extend(reader.read_outputs(data));
            if diags.has_error() {
                return diags;
            }
        }
        self.advance(Phase::ResultsRead);
        diags
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::record::ResourceRecord;
    use crate::settings::StagingBase;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn sh(verb: Verb, script: &str) -> ProgramSpec {
        ProgramSpec::new(
            verb,
            vec!["sh".to_string(), "-c".to_string(), script.to_string()],
        )
        .unwrap()
    }

    fn engine(base: &Path) -> Engine {
        Engine::new(
            Settings::default().with_staging_base(StagingBase::Fixed(base.to_path_buf())),
            ProviderConfig {
                input: "provider-in".into(),
                input_sensitive: "provider-secret".into(),
            },
        )
    }

    fn leftovers(base: &Path) -> Vec<PathBuf> {
        fs::read_dir(base)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    #[test]
    fn test_round_trip() {
        let base = TempDir::new().unwrap();
        let mut record = ResourceRecord::default().with_input("hello");
        let program = sh(
            Verb::Create,
            r#"cat "$EXT_FILE_input" > "$EXT_FILE_state"; echo -n ID1 > "$EXT_FILE_id""#,
        );

        let diags = engine(base.path()).run(
            &RunContext::background(),
            &mut record,
            Verb::Create,
            &program,
        );

        assert!(!diags.has_error(), "{diags:?}");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.warnings().count(), 1);
        assert_eq!(record.id, "ID1");
        assert_eq!(record.state, "hello");
        assert!(leftovers(base.path()).is_empty());
    }

    #[test]
    fn test_exit_status_failure() {
        let base = TempDir::new().unwrap();
        let mut record = ResourceRecord::new("keep-id", "keep-state");

        let diags = engine(base.path()).run(
            &RunContext::background(),
            &mut record,
            Verb::Update,
            &sh(Verb::Update, "echo -n changed > \"$EXT_FILE_state\"; exit 7"),
        );

        let errors: Vec<_> = diags.errors().collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].summary.contains("exit status: 7"));
        assert_eq!(record.id, "keep-id");
        assert_eq!(record.state, "keep-state");
        assert!(leftovers(base.path()).is_empty());
    }

    #[test]
    fn test_inputs_are_visible() {
        let base = TempDir::new().unwrap();
        let mut record = ResourceRecord::new("id-7", "previous")
            .with_input("in")
            .with_input_sensitive("secret")
            .with_planned_state("planned");
        let script = r#"
            {
                cat "$EXT_FILE_provider_input"; echo
                cat "$EXT_FILE_provider_input_sensitive"; echo
                cat "$EXT_FILE_input"; echo
                cat "$EXT_FILE_input_sensitive"; echo
                cat "$EXT_FILE_old_state"; echo
                cat "$EXT_FILE_state"; echo
                cat "$EXT_FILE_id"
            } > "$EXT_DIR/all"
            mv "$EXT_DIR/all" "$EXT_FILE_state"
        "#;

        let diags = engine(base.path()).run(
            &RunContext::background(),
            &mut record,
            Verb::Read,
            &sh(Verb::Read, script),
        );

        assert!(!diags.has_error(), "{diags:?}");
        assert_eq!(
            record.state,
            "provider-in\nprovider-secret\nin\nsecret\nprevious\nplanned\nid-7"
        );
        assert_eq!(record.id, "id-7");
    }

    #[test]
    fn test_deleted_state_file_fails() {
        let base = TempDir::new().unwrap();
        let mut record = ResourceRecord::new("", "before");

        let diags = engine(base.path()).run(
            &RunContext::background(),
            &mut record,
            Verb::Create,
            &sh(Verb::Create, r#"echo -n new-id > "$EXT_FILE_id"; rm "$EXT_FILE_state""#),
        );

        assert!(diags.has_error());
        assert!(diags.errors().next().unwrap().summary.contains("state"));
        assert_eq!(record.state, "before");
        assert!(leftovers(base.path()).is_empty());
    }

    /// Whether directory permissions stop this user, which is not so for root
    fn permissions_enforced() -> bool {
        use std::os::unix::fs::PermissionsExt;

        let scratch = TempDir::new().unwrap();
        let locked = scratch.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o500)).unwrap();
        let enforced = fs::write(locked.join("file"), "").is_err();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o700)).unwrap();
        enforced
    }

    #[test]
    fn test_cleanup_failure_is_trailing_warning() {
        use std::os::unix::fs::PermissionsExt;

        if !permissions_enforced() {
            return;
        }
        let base = TempDir::new().unwrap();
        let mut record = ResourceRecord::default();

        let diags = engine(base.path()).run(
            &RunContext::background(),
            &mut record,
            Verb::Create,
            &sh(
                Verb::Create,
                r#"echo -n ID9 > "$EXT_FILE_id"; echo -n done > "$EXT_FILE_state"; chmod 500 "$EXT_DIR""#,
            ),
        );

        let left = leftovers(base.path());
        for dir in &left {
            fs::set_permissions(dir, fs::Permissions::from_mode(0o700)).unwrap();
        }

        assert!(!diags.has_error(), "{diags:?}");
        let last = diags.iter().last().unwrap();
        assert!(!last.is_error());
        assert!(last.summary.starts_with("error when cleaning up"), "{last:?}");
        assert_eq!(record.id, "ID9");
        assert_eq!(record.state, "done");
        assert_eq!(left.len(), 1);
    }

    #[test]
    fn test_staging_failure_skips_program() {
        let base = TempDir::new().unwrap();
        let blocker = base.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let marker = base.path().join("ran");

        let mut settings = engine(base.path()).settings;
        settings.staging_base = StagingBase::Fixed(blocker);
        let mut record = ResourceRecord::default();
        let diags = run_program(
            &RunContext::background(),
            &settings,
            &ProviderConfig::default(),
            &mut record,
            Verb::Create,
            &sh(Verb::Create, &format!("touch {}", marker.display())),
        );

        assert!(diags.has_error());
        assert_eq!(diags.warnings().count(), 0);
        assert!(!marker.exists());
    }

    #[test]
    fn test_timeout_still_cleans_up() {
        let base = TempDir::new().unwrap();
        let mut engine = engine(base.path());
        engine.settings.timeout = Some(Duration::from_millis(200));
        let mut record = ResourceRecord::default();

        let started = Instant::now();
        let diags = engine.run(
            &RunContext::background(),
            &mut record,
            Verb::Read,
            &sh(Verb::Read, "exec sleep 30"),
        );

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(diags.errors().next().unwrap().summary.contains("timed out"));
        assert!(leftovers(base.path()).is_empty());
    }

    #[test]
    fn test_cancelled_context() {
        let base = TempDir::new().unwrap();
        let token = CancelToken::new();
        token.cancel();
        let ctx = RunContext::background().with_token(token);
        let mut record = ResourceRecord::default();

        let diags = engine(base.path()).run(
            &ctx,
            &mut record,
            Verb::Delete,
            &sh(Verb::Delete, "exec sleep 30"),
        );

        assert!(diags.errors().next().unwrap().summary.contains("cancelled"));
        assert!(leftovers(base.path()).is_empty());
    }

    #[test]
    fn test_outputs_read_when_enabled() {
        let base = TempDir::new().unwrap();
        let mut engine = engine(base.path());
        engine.settings.outputs = true;
        let mut record = ResourceRecord::default();

        let diags = engine.run(
            &RunContext::background(),
            &mut record,
            Verb::Create,
            &sh(
                Verb::Create,
                r#"echo -n id > "$EXT_FILE_id"; echo -n out > "$EXT_DIR/output""#,
            ),
        );

        assert!(!diags.has_error(), "{diags:?}");
        assert_eq!(record.output, "out");
        assert_eq!(record.output_sensitive, "");
    }

    #[test]
    fn test_custom_prefix() {
        let base = TempDir::new().unwrap();
        let mut engine = engine(base.path());
        engine.settings.prefix = "TF_CUSTOM".into();
        let mut record = ResourceRecord::default().with_input("via-prefix");

        let diags = engine.run(
            &RunContext::background(),
            &mut record,
            Verb::Create,
            &sh(
                Verb::Create,
                r#"cp "$TF_CUSTOM_FILE_input" "$TF_CUSTOM_DIR/state""#,
            ),
        );

        assert!(!diags.has_error(), "{diags:?}");
        assert_eq!(record.state, "via-prefix");
    }

    #[test]
    fn test_concurrent_runs_are_isolated() {
        let base = TempDir::new().unwrap();
        let engine = engine(base.path());
        let program = sh(
            Verb::Create,
            r#"cat "$EXT_FILE_input" > "$EXT_FILE_state"; printf '%s' "$EXT_DIR" > "$EXT_FILE_id""#,
        );

        let records: Vec<ResourceRecord> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let engine = &engine;
                    let program = &program;
                    scope.spawn(move || {
                        let mut record = ResourceRecord::default().with_input(format!("input-{i}"));
                        let diags =
                            engine.run(&RunContext::background(), &mut record, Verb::Create, program);
                        assert!(!diags.has_error(), "{diags:?}");
                        record
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut dirs: Vec<_> = records.iter().map(|r| r.id.clone()).collect();
        dirs.sort();
        dirs.dedup();
        assert_eq!(dirs.len(), 8);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.state, format!("input-{i}"));
            assert!(!Path::new(&record.id).exists());
        }
        assert!(leftovers(base.path()).is_empty());
    }
}
