// spool.rs
//
// Points that could not be delivered are kept on disk until the next
// successful write. The file is a postcard blob with a crc32 trailer.

use std::{io, path::PathBuf};

use tokio::fs;

use crc::{Crc, CRC_32_ISCSI};

use crate::*;

static SPOOL_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

pub struct Spool {
    path: PathBuf,
}

impl Spool {
    pub fn new(path: PathBuf) -> Self {
        Spool { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Spooled points. A missing file is an empty spool, a corrupt one
    /// is logged and removed.
    pub async fn load(&self) -> Vec<Point> {
        let b = match fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                error!("Spool read error {e:?}");
                return Vec::new();
            }
        };
        debug!("Got {sz} bytes from spool. Parsing...", sz = b.len());

        match postcard::from_bytes_crc32::<Vec<Point>>(&b, SPOOL_CRC.digest()) {
            Ok(points) => points,
            Err(e) => {
                error!("Cannot parse spool {}: {e:?}, discarding it", self.path.display());
                if let Err(e) = self.clear().await {
                    error!("{e:#}");
                }
                Vec::new()
            }
        }
    }

    pub async fn store(&self, points: &[Point]) -> anyhow::Result<()> {
        let data = match postcard::to_allocvec_crc32(points, SPOOL_CRC.digest()) {
            Ok(d) => d,
            Err(e) => {
                bail!("Cannot encode spool {e:?}");
            }
        };
        info!(
            "Encoded {n} points to {sz} bytes. Saving spool...",
            n = points.len(),
            sz = data.len()
        );
        if let Err(e) = fs::write(&self.path, data).await {
            bail!("Cannot save spool {}: {e:?}", self.path.display());
        }
        Ok(())
    }

    pub async fn clear(&self) -> anyhow::Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => bail!("Cannot remove spool {}: {e:?}", self.path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn spool(name: &str) -> Spool {
        let p = std::env::temp_dir().join(format!("f451-spool-{}-{name}", std::process::id()));
        let s = Spool::new(p);
        s.clear().await.unwrap();
        s
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let s = spool("roundtrip").await;
        assert!(s.load().await.is_empty());

        let points = vec![
            Point::new("f451", 1.0).tag("sensor", "a").at(1),
            Point::new("f451", 2.5).tag("sensor", "b").at(2),
        ];
        s.store(&points).await.unwrap();
        assert_eq!(s.load().await, points);

        s.clear().await.unwrap();
        assert!(s.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_is_discarded() {
        let s = spool("corrupt").await;
        s.store(&[Point::new("f451", 1.0).at(1)]).await.unwrap();

        let mut b = std::fs::read(s.path()).unwrap();
        let last = b.len() - 1;
        b[last] ^= 0xff;
        std::fs::write(s.path(), b).unwrap();

        assert!(s.load().await.is_empty());
        assert!(!s.path().exists());
    }
}

// EOF
