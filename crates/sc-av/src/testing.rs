//! Shell-script stand-ins for ffmpeg and ffprobe.
//!
//! The scripts follow the one convention stillcast relies on: the output
//! path is the last argument. They let pipeline behaviour (success, tool
//! failure, timeouts) be exercised on machines without ffmpeg installed.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use sc_core::config::ToolsConfig;
use tempfile::TempDir;

use crate::tools::ToolRegistry;

/// Bytes every successful fake ffmpeg run writes to its output.
pub const FAKE_OUTPUT: &str = "stillcast-fake-output";

/// Writes [`FAKE_OUTPUT`] to the last argument and exits 0.
pub const FFMPEG_OK: &str = r#"for last; do :; done
printf 'stillcast-fake-output' > "$last"
"#;

/// Sleeps far past any test budget.
pub const FFMPEG_HANG: &str = "exec sleep 30\n";

/// Fails every invocation with an ffmpeg-like diagnostic.
pub const FFMPEG_FAIL: &str = r#"echo "Invalid data found when processing input" >&2
exit 1
"#;

/// Composites normally, hangs on the mux (the only call using `-loop`).
pub const FFMPEG_HANG_ON_MUX: &str = r#"for last; do :; done
case " $* " in
  *" -loop "*) exec sleep 30 ;;
esac
printf 'stillcast-fake-output' > "$last"
"#;

/// Composites normally, writes a partial video on the mux and then fails.
pub const FFMPEG_FAIL_ON_MUX: &str = r#"for last; do :; done
case " $* " in
  *" -loop "*)
    printf 'partial' > "$last"
    echo "Conversion failed!" >&2
    exit 1
    ;;
esac
printf 'stillcast-fake-output' > "$last"
"#;

/// Exits 0 without writing anything.
pub const FFMPEG_SILENT: &str = "exit 0\n";

/// Composites normally, exits 0 on the mux without writing a video.
pub const FFMPEG_SILENT_ON_MUX: &str = r#"for last; do :; done
case " $* " in
  *" -loop "*) exit 0 ;;
esac
printf 'stillcast-fake-output' > "$last"
"#;

/// ffprobe that reports an audio stream of `secs` seconds.
pub fn ffprobe_reporting(secs: &str) -> String {
    format!(
        "cat <<'EOF'\n{{\"format\":{{\"duration\":\"{secs}\"}},\"streams\":[{{\"codec_type\":\"audio\",\"duration\":\"{secs}\"}}]}}\nEOF\n"
    )
}

/// ffprobe that rejects its input.
pub const FFPROBE_FAIL: &str = r#"echo "Invalid data found when processing input" >&2
exit 1
"#;

/// Answers `-version` the way the real tools do, before any script body runs.
const VERSION_PREAMBLE: &str = r#"if [ "$1" = "-version" ]; then
  echo "$(basename "$0") version stillcast-fake"
  exit 0
fi
"#;

/// Write an executable `#!/bin/sh` script named `name` into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{VERSION_PREAMBLE}{body}")).expect("write fake tool");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake tool");
    path
}

/// A temp directory holding a fake ffmpeg and a fake ffprobe.
pub struct FakeTools {
    dir: TempDir,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl FakeTools {
    pub fn new(ffmpeg_body: &str, ffprobe_body: &str) -> Self {
        let dir = tempfile::tempdir().expect("create fake tool dir");
        let ffmpeg = write_script(dir.path(), "ffmpeg", ffmpeg_body);
        let ffprobe = write_script(dir.path(), "ffprobe", ffprobe_body);
        Self {
            dir,
            ffmpeg,
            ffprobe,
        }
    }

    /// Fake tools that succeed and report a 12.34 s audio clip.
    pub fn working() -> Self {
        Self::new(FFMPEG_OK, &ffprobe_reporting("12.340000"))
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn tools_config(&self) -> ToolsConfig {
        ToolsConfig {
            ffmpeg_path: Some(self.ffmpeg.clone()),
            ffprobe_path: Some(self.ffprobe.clone()),
        }
    }

    pub fn registry(&self) -> ToolRegistry {
        ToolRegistry::discover(&self.tools_config())
    }
}
