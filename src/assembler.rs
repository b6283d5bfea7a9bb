use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{error, info};

use crate::highlights::CutRange;
use crate::media::{MediaError, MediaToolkit};

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("cutting clip {index} failed: {source}")]
    ClipFailed {
        index: usize,
        #[source]
        source: MediaError,
    },
    #[error("concatenating clips failed: {source}")]
    ConcatFailed {
        #[source]
        source: MediaError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Cuts each validated range into an intermediate clip and losslessly
/// concatenates them into the final highlight video.
///
/// A run walks CUTTING(0..n) then CONCATENATING; any failure aborts the
/// whole run, since a reel silently missing a segment is worse than a
/// clear failure. Intermediate clips and the concat manifest live in a scoped
/// temporary directory that is removed on every exit path. Each call to
/// [`assemble`](ClipAssembler::assemble) is an independent run.
pub struct ClipAssembler {
    toolkit: Arc<dyn MediaToolkit>,
}

impl ClipAssembler {
    pub fn new(toolkit: Arc<dyn MediaToolkit>) -> Self {
        Self { toolkit }
    }

    /// Produce the highlight video at `destination` from `cuts` of `source`.
    ///
    /// On failure no partial file remains at `destination`.
    pub async fn assemble(
        &self,
        source: &Path,
        cuts: &[CutRange],
        destination: &Path,
    ) -> Result<PathBuf, AssemblyError> {
        info!(
            "assembling {} clips from {} into {}",
            cuts.len(),
            source.display(),
            destination.display()
        );

        // Exclusively owned by this run; dropped (and deleted) on every path out.
        let clip_dir = TempDir::new()?;

        let clip_ext = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");

        let mut clip_paths = Vec::with_capacity(cuts.len());
        for (index, range) in cuts.iter().enumerate() {
            let clip_path = clip_dir.path().join(format!("clip_{}.{}", index, clip_ext));
            self.toolkit
                .cut(source, *range, &clip_path)
                .await
                .map_err(|source| {
                    error!("clip {} of {} failed, aborting run", index + 1, cuts.len());
                    AssemblyError::ClipFailed { index, source }
                })?;
            clip_paths.push(clip_path);
        }

        // Concat-demuxer manifest. Absolute paths, so ffmpeg's notion of the
        // working directory cannot matter.
        let manifest_path = clip_dir.path().join("concat_list.txt");
        let manifest: String = clip_paths
            .iter()
            .map(|clip| format!("file '{}'\n", clip.display()))
            .collect();
        tokio::fs::write(&manifest_path, manifest).await?;

        if let Err(source) = self.toolkit.concat(&manifest_path, destination).await {
            // Never leave a partial artifact behind.
            let _ = tokio::fs::remove_file(destination).await;
            return Err(AssemblyError::ConcatFailed { source });
        }

        info!("highlight video created: {}", destination.display());
        Ok(destination.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaInfo;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Toolkit double: succeeds by touching output files, except for cuts
    /// whose index is in `fail_cuts`.
    struct ScriptedToolkit {
        fail_cuts: Vec<usize>,
        fail_concat: bool,
        cut_calls: Mutex<Vec<PathBuf>>,
    }

    impl ScriptedToolkit {
        fn new(fail_cuts: Vec<usize>, fail_concat: bool) -> Self {
            Self {
                fail_cuts,
                fail_concat,
                cut_calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MediaToolkit for ScriptedToolkit {
        async fn probe(&self, _video: &Path) -> Result<MediaInfo, MediaError> {
            Ok(MediaInfo { duration: 600.0 })
        }

        async fn extract_audio(&self, _video: &Path, audio_out: &Path) -> Result<(), MediaError> {
            std::fs::write(audio_out, b"wav")?;
            Ok(())
        }

        async fn cut(
            &self,
            _video: &Path,
            _range: CutRange,
            clip_out: &Path,
        ) -> Result<(), MediaError> {
            let index = self.cut_calls.lock().unwrap().len();
            self.cut_calls.lock().unwrap().push(clip_out.to_path_buf());
            if self.fail_cuts.contains(&index) {
                return Err(MediaError::CommandFailed {
                    tool: "ffmpeg",
                    stderr: "clip_0.mp4: Invalid argument".to_string(),
                });
            }
            std::fs::write(clip_out, b"clip")?;
            Ok(())
        }

        async fn concat(&self, manifest: &Path, video_out: &Path) -> Result<(), MediaError> {
            assert!(manifest.exists());
            if self.fail_concat {
                // ffmpeg would typically leave a partial file behind
                std::fs::write(video_out, b"partial")?;
                return Err(MediaError::CommandFailed {
                    tool: "ffmpeg",
                    stderr: "concat failed".to_string(),
                });
            }
            std::fs::write(video_out, b"final")?;
            Ok(())
        }
    }

    fn cuts(n: usize) -> Vec<CutRange> {
        (0..n)
            .map(|i| CutRange {
                start: i as f64 * 10.0,
                end: i as f64 * 10.0 + 5.0,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_successful_run_produces_destination() {
        let toolkit = Arc::new(ScriptedToolkit::new(vec![], false));
        let assembler = ClipAssembler::new(toolkit.clone());
        let out_dir = tempdir().unwrap();
        let dest = out_dir.path().join("reel.mp4");

        let produced = assembler
            .assemble(Path::new("/videos/source.mp4"), &cuts(3), &dest)
            .await
            .unwrap();

        assert_eq!(produced, dest);
        assert!(dest.exists());
        assert_eq!(toolkit.cut_calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_second_cut_failing_aborts_run() {
        let toolkit = Arc::new(ScriptedToolkit::new(vec![1], false));
        let assembler = ClipAssembler::new(toolkit.clone());
        let out_dir = tempdir().unwrap();
        let dest = out_dir.path().join("reel.mp4");

        let err = assembler
            .assemble(Path::new("/videos/source.mp4"), &cuts(3), &dest)
            .await
            .unwrap_err();

        match err {
            AssemblyError::ClipFailed { index, source } => {
                assert_eq!(index, 1);
                assert!(source.to_string().contains("Invalid argument"));
            }
            other => panic!("expected ClipFailed, got {:?}", other),
        }

        // No skip-and-continue: the third cut never ran.
        let calls = toolkit.cut_calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        // No partial output, and the temp clip directory is gone.
        assert!(!dest.exists());
        let temp_clip_dir = calls[0].parent().unwrap();
        assert!(!temp_clip_dir.exists());
    }

    #[tokio::test]
    async fn test_concat_failure_removes_partial_destination() {
        let toolkit = Arc::new(ScriptedToolkit::new(vec![], true));
        let assembler = ClipAssembler::new(toolkit);
        let out_dir = tempdir().unwrap();
        let dest = out_dir.path().join("reel.mp4");

        let err = assembler
            .assemble(Path::new("/videos/source.mp4"), &cuts(2), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, AssemblyError::ConcatFailed { .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_manifest_lists_clips_in_cut_order() {
        struct ManifestCapture(Mutex<Option<String>>);

        #[async_trait]
        impl MediaToolkit for ManifestCapture {
            async fn probe(&self, _v: &Path) -> Result<MediaInfo, MediaError> {
                Ok(MediaInfo { duration: 600.0 })
            }
            async fn extract_audio(&self, _v: &Path, _a: &Path) -> Result<(), MediaError> {
                Ok(())
            }
            async fn cut(&self, _v: &Path, _r: CutRange, out: &Path) -> Result<(), MediaError> {
                std::fs::write(out, b"clip")?;
                Ok(())
            }
            async fn concat(&self, manifest: &Path, out: &Path) -> Result<(), MediaError> {
                *self.0.lock().unwrap() = Some(std::fs::read_to_string(manifest)?);
                std::fs::write(out, b"final")?;
                Ok(())
            }
        }

        let toolkit = Arc::new(ManifestCapture(Mutex::new(None)));
        let assembler = ClipAssembler::new(toolkit.clone());
        let out_dir = tempdir().unwrap();
        let dest = out_dir.path().join("reel.mkv");

        assembler
            .assemble(Path::new("/videos/source.mkv"), &cuts(2), &dest)
            .await
            .unwrap();

        let manifest = toolkit.0.lock().unwrap().take().unwrap();
        let lines: Vec<&str> = manifest.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("clip_0.mkv"));
        assert!(lines[1].contains("clip_1.mkv"));
        assert!(lines[0].starts_with("file '/"), "absolute path expected");
    }
}
