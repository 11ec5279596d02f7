// Virtual filesystem surface for the codec driver (§4.6, §6.5).
//
// Backed by a real temp directory — this is the intended use of the
// `tempfile` dependency the teacher crate declared but never exercised.
// Every name is scoped under the VFS root so concurrent `CodecDriver`s never
// collide, and the §6.5 naming convention (job id prefixes) additionally
// prevents collisions between concurrent jobs sharing one VFS.

use std::path::PathBuf;

use tempfile::TempDir;
use uuid::Uuid;

use loopcut_core::{Container, PosterFormat, RenderError, Result};

pub struct CodecVfs {
    dir: TempDir,
}

impl CodecVfs {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new().map_err(RenderError::Io)?;
        Ok(CodecVfs { dir })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        std::fs::write(self.path(name), bytes).map_err(RenderError::Io)
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        std::fs::read(self.path(name)).map_err(RenderError::Io)
    }

    /// Best-effort per §7: failures are never propagated, only logged.
    pub fn unlink(&self, name: &str) {
        if let Err(e) = std::fs::remove_file(self.path(name)) {
            log::debug!("vfs unlink {name} failed (best-effort): {e}");
        }
    }
}

pub fn input_name(job_id: Uuid) -> String {
    format!("input-{job_id}")
}

pub fn output_name(job_id: Uuid, container: Container) -> String {
    format!("output-{job_id}.{}", container_ext(container))
}

pub fn encode_frame_name(rank: u32) -> String {
    format!("frame-{rank:05}.png")
}

pub fn poster_name(job_id: Uuid, format: PosterFormat) -> String {
    format!("poster-{job_id}.{}", poster_ext(format))
}

fn container_ext(container: Container) -> &'static str {
    match container {
        Container::Mp4 => "mp4",
        Container::Webm => "webm",
    }
}

fn poster_ext(format: PosterFormat) -> &'static str {
    match format {
        PosterFormat::Png => "png",
        PosterFormat::Webp => "webp",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrips() {
        let vfs = CodecVfs::new().unwrap();
        vfs.write("test.bin", b"hello").unwrap();
        assert_eq!(vfs.read("test.bin").unwrap(), b"hello");
    }

    #[test]
    fn unlink_is_best_effort() {
        let vfs = CodecVfs::new().unwrap();
        vfs.unlink("does-not-exist.bin");
    }

    #[test]
    fn naming_matches_convention() {
        let id = Uuid::nil();
        assert_eq!(input_name(id), format!("input-{id}"));
        assert_eq!(output_name(id, Container::Mp4), format!("output-{id}.mp4"));
        assert_eq!(encode_frame_name(3), "frame-00003.png");
        assert_eq!(poster_name(id, PosterFormat::Webp), format!("poster-{id}.webp"));
    }
}
