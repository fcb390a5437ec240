use std::io;
use std::path::Path;

/// Capability for retrieving external descriptor sources named by
/// `%rec: Type SOURCE`. The kernel never talks to the network itself;
/// callers inject whatever transport they trust.
pub trait Fetcher {
    fn fetch(&self, location: &str) -> io::Result<Vec<u8>>;
}

/// The default fetcher: local files only. Anything that looks like a URL
/// is refused so a plain integrity run cannot be made to touch the
/// network.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

impl Fetcher for FileFetcher {
    fn fetch(&self, location: &str) -> io::Result<Vec<u8>> {
        if location.contains("://") {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("remote locations are not supported by the file fetcher: {location}"),
            ));
        }
        std::fs::read(Path::new(location))
    }
}

/// A fetcher that refuses everything; handy when remote descriptors are
/// disabled wholesale.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFetcher;

impl Fetcher for NoFetcher {
    fn fetch(&self, location: &str) -> io::Result<Vec<u8>> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("descriptor fetching is disabled: {location}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_fetcher_refuses_urls() {
        let err = FileFetcher.fetch("http://example.com/x.rec").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_no_fetcher_refuses_everything() {
        assert!(NoFetcher.fetch("anything").is_err());
    }
}
