//! The widget location: a base URL plus an optional `#room` fragment.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    base: String,
    fragment: Option<String>,
}

impl Location {
    /// Split at the first `#`. An empty fragment counts as none.
    pub fn parse(url: &str) -> Self {
        match url.split_once('#') {
            Some((base, fragment)) => Self {
                base: base.to_string(),
                fragment: (!fragment.is_empty()).then(|| fragment.to_string()),
            },
            None => Self {
                base: url.to_string(),
                fragment: None,
            },
        }
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    pub fn set_fragment(&mut self, fragment: &str) {
        self.fragment = (!fragment.is_empty()).then(|| fragment.to_string());
    }

    /// Where `/open <target>` leads: `#room` keeps the base, anything else
    /// is a full location.
    pub fn navigate(&self, target: &str) -> Location {
        let target = target.trim();
        match target.strip_prefix('#') {
            Some(fragment) => {
                let mut next = self.clone();
                next.set_fragment(fragment);
                next
            }
            None => Location::parse(target),
        }
    }

    pub fn href(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fragment {
            Some(fragment) => write!(f, "{}#{}", self.base, fragment),
            None => f.write_str(&self.base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_fragment() {
        let loc = Location::parse("roomchat://local/#lobby");
        assert_eq!(loc.fragment(), Some("lobby"));
        assert_eq!(loc.href(), "roomchat://local/#lobby");
    }

    #[test]
    fn empty_fragment_is_none() {
        assert_eq!(Location::parse("roomchat://local/#").fragment(), None);
        assert_eq!(Location::parse("roomchat://local/").fragment(), None);
        assert_eq!(Location::parse("roomchat://local/#").href(), "roomchat://local/");
    }

    #[test]
    fn set_fragment_mirrors_room() {
        let mut loc = Location::parse("https://chat.example/");
        loc.set_fragment("test-room");
        assert_eq!(loc.href(), "https://chat.example/#test-room");
    }

    #[test]
    fn navigate_to_fragment_keeps_base() {
        let loc = Location::parse("https://chat.example/#one");
        let next = loc.navigate("#two");
        assert_eq!(next.href(), "https://chat.example/#two");
        assert_ne!(loc, next);
        assert_eq!(loc, loc.navigate("#one"));
    }

    #[test]
    fn navigate_to_full_url() {
        let loc = Location::parse("https://chat.example/#one");
        let next = loc.navigate(" https://other.example/#two ");
        assert_eq!(next.href(), "https://other.example/#two");
        assert_eq!(next.fragment(), Some("two"));
    }
}
