//! Targets and routes
//!
//! A [`Target`] is the tagged reference `page:<id>` / `view:<id>` used by app
//! home settings, actions and navigation. A [`Route`] adds the module id and
//! the optional active record, and maps to `/apps/{module}/{page|view}/{id}`.

use crate::error::TargetError;
use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Default query parameter carrying the active record id
pub const DEFAULT_RECORD_PARAM: &str = "record";

/// Kind of surface a target points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetKind {
    /// A page (`page:<id>`)
    Page,
    /// A view (`view:<id>`)
    View,
}

impl TargetKind {
    /// Prefix / route segment for this kind
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::View => "view",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "page" => Some(Self::Page),
            "view" => Some(Self::View),
            _ => None,
        }
    }
}

/// Parsed `page:<id>` / `view:<id>` reference
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Target {
    /// Page or view
    pub kind: TargetKind,
    /// Page or view id
    pub id: String,
}

impl Target {
    /// Page target
    #[inline]
    #[must_use]
    pub fn page(id: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Page,
            id: id.into(),
        }
    }

    /// View target
    #[inline]
    #[must_use]
    pub fn view(id: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::View,
            id: id.into(),
        }
    }

    /// Whether this target points at a page
    #[inline]
    #[must_use]
    pub fn is_page(&self) -> bool {
        self.kind == TargetKind::Page
    }
}

fn valid_id(id: &str) -> bool {
    !id.is_empty()
        && !id
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '&' | ':'))
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, id) = s
            .split_once(':')
            .ok_or_else(|| TargetError::Invalid(s.to_string()))?;
        let kind =
            TargetKind::from_segment(prefix).ok_or_else(|| TargetError::Invalid(s.to_string()))?;
        if !valid_id(id) {
            return Err(TargetError::Invalid(s.to_string()));
        }
        Ok(Self {
            kind,
            id: id.to_string(),
        })
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// Navigable location inside an application module
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    /// Application module id
    pub module_id: String,
    /// Page or view
    pub target: Target,
    /// Active record, if any
    pub record_id: Option<String>,
}

impl Route {
    /// Create route without an active record
    #[inline]
    #[must_use]
    pub fn new(module_id: impl Into<String>, target: Target) -> Self {
        Self {
            module_id: module_id.into(),
            target,
            record_id: None,
        }
    }

    /// With active record id
    #[inline]
    #[must_use]
    pub fn with_record(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    /// Render as `/apps/{module}/{page|view}/{id}[?{param}={record}]`
    #[must_use]
    pub fn to_path(&self, record_param: &str) -> String {
        let mut path = format!(
            "/apps/{}/{}/{}",
            self.module_id,
            self.target.kind.as_str(),
            self.target.id
        );
        if let Some(record_id) = &self.record_id {
            path.push('?');
            path.push_str(record_param);
            path.push('=');
            path.push_str(&urlencoding::encode(record_id));
        }
        path
    }

    /// Parse a path produced by [`Route::to_path`]
    ///
    /// Returns `None` for anything that is not a well-formed app route.
    #[must_use]
    pub fn parse_path(path: &str, record_param: &str) -> Option<Self> {
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path, None),
        };
        let mut segments = path.trim_end_matches('/').split('/');
        if segments.next() != Some("") || segments.next() != Some("apps") {
            return None;
        }
        let module_id = segments.next().filter(|m| valid_id(m))?;
        let kind = TargetKind::from_segment(segments.next()?)?;
        let id = segments.next().filter(|id| valid_id(id))?;
        if segments.next().is_some() {
            return None;
        }
        let record_id = query.and_then(|query| {
            query.split('&').find_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                if key != record_param || value.is_empty() {
                    return None;
                }
                urlencoding::decode(value).ok().map(Cow::into_owned)
            })
        });
        Some(Self {
            module_id: module_id.to_string(),
            target: Target {
                kind,
                id: id.to_string(),
            },
            record_id,
        })
    }
}

/// Build a route from a module id and a raw target string
///
/// Pure and total: malformed input yields `None`.
#[must_use]
pub fn build_route(module_id: &str, target: &str) -> Option<Route> {
    if !valid_id(module_id) {
        return None;
    }
    let target = target.parse::<Target>().ok()?;
    Some(Route::new(module_id, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_page_and_view() {
        assert_eq!("page:home".parse::<Target>().unwrap(), Target::page("home"));
        assert_eq!(
            "view:product.list".parse::<Target>().unwrap(),
            Target::view("product.list")
        );
    }

    #[test]
    fn parse_rejects_other_forms() {
        for raw in ["", "home", "page:", "form:x", "Page:home", "page: home", "page:a/b", "view:a:b"] {
            assert!(
                matches!(raw.parse::<Target>(), Err(TargetError::Invalid(_))),
                "{raw:?} should be invalid"
            );
        }
    }

    #[test]
    fn display_matches_input() {
        assert_eq!(Target::view("orders").to_string(), "view:orders");
    }

    #[test]
    fn route_path_shape() {
        let route = Route::new("shop", Target::page("home"));
        assert_eq!(route.to_path(DEFAULT_RECORD_PARAM), "/apps/shop/page/home");

        let route = Route::new("shop", Target::view("product.form")).with_record("p 1");
        assert_eq!(
            route.to_path(DEFAULT_RECORD_PARAM),
            "/apps/shop/view/product.form?record=p%201"
        );
    }

    #[test]
    fn parse_path_with_custom_param() {
        let route = Route::parse_path("/apps/shop/view/orders?rid=42&x=1", "rid").unwrap();
        assert_eq!(route.record_id.as_deref(), Some("42"));
        assert!(Route::parse_path("/apps/shop/view/orders?record=42", "rid")
            .unwrap()
            .record_id
            .is_none());
    }

    #[test]
    fn parse_path_decodes_record() {
        let route = Route::parse_path("/apps/shop/view/orders?record=a%2Fb%20c%C3%A9", DEFAULT_RECORD_PARAM)
            .unwrap();
        assert_eq!(route.record_id.as_deref(), Some("a/b cé"));
    }

    #[test]
    fn parse_path_rejects_malformed() {
        assert!(Route::parse_path("/apps/shop", DEFAULT_RECORD_PARAM).is_none());
        assert!(Route::parse_path("/apps/shop/form/x", DEFAULT_RECORD_PARAM).is_none());
        assert!(Route::parse_path("apps/shop/page/x", DEFAULT_RECORD_PARAM).is_none());
        assert!(Route::parse_path("/apps/shop/page/x/extra", DEFAULT_RECORD_PARAM).is_none());
    }

    #[test]
    fn build_route_is_total() {
        assert!(build_route("shop", "nonsense").is_none());
        assert!(build_route("", "page:home").is_none());
        assert!(build_route("sh op", "page:home").is_none());
        let route = build_route("shop", "page:home").unwrap();
        assert_eq!(route.target, Target::page("home"));
    }

    proptest! {
        #[test]
        fn prop_parse_route_parse_roundtrip(
            is_page in any::<bool>(),
            id in "[a-z][a-z0-9_.-]{0,24}",
            module in "[a-z][a-z0-9_-]{0,12}",
            record in proptest::option::of("[ -~]{1,16}"),
        ) {
            let raw = format!("{}:{}", if is_page { "page" } else { "view" }, id);
            let parsed: Target = raw.parse().unwrap();
            let mut route = build_route(&module, &raw).unwrap();
            route.record_id = record.clone();

            let path = route.to_path(DEFAULT_RECORD_PARAM);
            let back = Route::parse_path(&path, DEFAULT_RECORD_PARAM).unwrap();

            prop_assert_eq!(&back.target, &parsed);
            prop_assert_eq!(back.target.to_string(), raw);
            prop_assert_eq!(back.module_id, module);
            prop_assert_eq!(back.record_id, record);
        }
    }
}
