//! Addresses of remote resources.
//!
//! A [`ResourceAddress`] is an origin plus an ordered list of path segments.
//! Extending an address never touches the network and never mutates the
//! original; it returns a new address.

use std::fmt;

use percent_encoding::percent_decode_str;
use url::Url;

/// Errors related to building resource addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// An extension argument was empty or consisted only of separators.
    EmptySegment { position: usize },
    /// The base URL could not be parsed.
    InvalidUrl { url: String, message: String },
    /// The URL cannot carry a path (e.g. `mailto:`).
    NotHierarchical { url: String },
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::EmptySegment { position } => {
                write!(f, "empty path segment at position {}", position)
            }
            AddressError::InvalidUrl { url, message } => {
                write!(f, "invalid url '{}': {}", url, message)
            }
            AddressError::NotHierarchical { url } => {
                write!(f, "url '{}' cannot carry a path", url)
            }
        }
    }
}

impl std::error::Error for AddressError {}

/// The location of a remote resource.
///
/// The address is split into an origin (`scheme://host[:port]`) and decoded
/// path segments. [`ResourceAddress::url`] re-encodes the segments, so the
/// address always renders as a single well-formed absolute URL.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ResourceAddress {
    origin: Url,
    segments: Vec<String>,
    access_token: Option<String>,
}

impl ResourceAddress {
    /// Parse an absolute URL into an address.
    ///
    /// Query strings and fragments are discarded; the path becomes the
    /// segment list.
    ///
    /// ```rust
    /// use rabj_core::ResourceAddress;
    ///
    /// let address = ResourceAddress::parse("http://h/rabj/store/").unwrap();
    /// assert_eq!(address.segments(), ["rabj", "store"]);
    /// assert_eq!(address.to_string(), "http://h/rabj/store");
    /// ```
    pub fn parse(url: &str) -> Result<Self, AddressError> {
        let parsed = Url::parse(url).map_err(|e| AddressError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(AddressError::NotHierarchical {
                url: url.to_string(),
            });
        }

        let mut origin = parsed.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);

        let mut segments = Vec::new();
        if let Some(pieces) = parsed.path_segments() {
            for piece in pieces {
                let decoded = percent_decode_str(piece).decode_utf8_lossy();
                push_piece(&mut segments, &decoded);
            }
        }

        Ok(ResourceAddress {
            origin,
            segments,
            access_token: None,
        })
    }

    /// Build an address from a base URL and a path relative to it.
    ///
    /// Leading, trailing and doubled separators in `path` are ignored, so
    /// `new("http://h/", "/rabj/store/")` and `new("http://h", "rabj/store")`
    /// are the same address.
    pub fn new(base_url: &str, path: &str) -> Result<Self, AddressError> {
        let mut address = Self::parse(base_url)?;
        for piece in path.split('/') {
            push_piece(&mut address.segments, piece);
        }
        Ok(address)
    }

    /// Return a copy of this address carrying `token` as its access key.
    #[must_use]
    pub fn with_access_token(&self, token: impl Into<String>) -> Self {
        let mut address = self.clone();
        address.access_token = Some(token.into());
        address
    }

    /// Return a copy of this address without an access key.
    #[must_use]
    pub fn without_access_token(&self) -> Self {
        let mut address = self.clone();
        address.access_token = None;
        address
    }

    /// Append segments, returning a new address.
    ///
    /// Each argument may itself contain `/`; it is split and normalized.
    /// `.` pieces are dropped and `..` pops the previous segment (never past
    /// the origin). An argument with no content is rejected.
    pub fn extend<I, S>(&self, segments: I) -> Result<Self, AddressError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut extended = self.segments.clone();
        for (position, segment) in segments.into_iter().enumerate() {
            let segment = segment.as_ref();
            let mut pieces = segment.split('/').filter(|p| !p.is_empty()).peekable();
            if pieces.peek().is_none() {
                return Err(AddressError::EmptySegment { position });
            }
            for piece in pieces {
                push_piece(&mut extended, piece);
            }
        }

        Ok(ResourceAddress {
            origin: self.origin.clone(),
            segments: extended,
            access_token: self.access_token.clone(),
        })
    }

    /// Append a single segment.
    pub fn child(&self, name: &str) -> Result<Self, AddressError> {
        self.extend([name])
    }

    /// The origin of this address with no path.
    #[must_use]
    pub fn host_root(&self) -> Self {
        ResourceAddress {
            origin: self.origin.clone(),
            segments: Vec::new(),
            access_token: self.access_token.clone(),
        }
    }

    /// Address of a server-side id such as `/rabj/store/queues/q1`, resolved
    /// against this address's origin.
    ///
    /// Ids arrive in URL form, so pieces are percent-decoded the same way
    /// [`ResourceAddress::parse`] decodes a path.
    pub fn from_id(&self, id: &str) -> Result<Self, AddressError> {
        let decoded: Vec<String> = id
            .split('/')
            .map(|piece| percent_decode_str(piece).decode_utf8_lossy().into_owned())
            .collect();
        if decoded.iter().all(|piece| piece.is_empty()) {
            return Err(AddressError::EmptySegment { position: 0 });
        }
        let mut address = self.host_root();
        for piece in &decoded {
            push_piece(&mut address.segments, piece);
        }
        Ok(address)
    }

    /// The decoded path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The access key carried by this address, if any.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// The origin rendered as a string, without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.origin.as_str().trim_end_matches('/')
    }

    /// The absolute URL of this address.
    pub fn url(&self) -> Url {
        let mut url = self.origin.clone();
        // Construction rejects URLs that cannot be a base, so this is Ok.
        if let Ok(mut path) = url.path_segments_mut() {
            path.clear().extend(&self.segments);
        }
        url
    }
}

fn push_piece(segments: &mut Vec<String>, piece: &str) {
    match piece {
        "" | "." => {}
        ".." => {
            segments.pop();
        }
        other => segments.push(other.to_string()),
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

impl std::ops::Index<usize> for ResourceAddress {
    type Output = String;

    fn index(&self, i: usize) -> &Self::Output {
        &self.segments[i]
    }
}
