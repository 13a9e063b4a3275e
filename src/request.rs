//! Splitting inbound paths into artifact coordinates.

use crate::error::{GatewayError, GatewayResult};

/// Literal version segment asking the gateway to resolve the newest version
pub const LATEST: &str = "latest";

/// Components of `/{repo}/javadoc/{category}/{g1}/{g2}/{artifact}/{version}`
const JAVADOC_COMPONENTS: usize = 8;

/// Minimum components of `/{repo}/{kind}/{category}/{group...}/{artifact}`
const DEPENDENCY_MIN_COMPONENTS: usize = 6;

/// Identifies one remote Javadoc archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveCoordinate {
    pub category: String,
    pub group: Vec<String>,
    pub artifact: String,
    pub version: String,
}

impl ArchiveCoordinate {
    /// `group/artifact`, the directory holding one folder per version
    pub fn dependency_path(&self) -> String {
        let mut segments = self.group.clone();
        segments.push(self.artifact.clone());
        segments.join("/")
    }

    /// `category/group/artifact/version`
    pub fn base_path(&self) -> String {
        format!(
            "{}/{}/{}",
            self.category,
            self.dependency_path(),
            self.version
        )
    }

    pub fn archive_file_name(&self) -> String {
        format!("{}-{}-javadoc.jar", self.artifact, self.version)
    }

    pub fn wants_latest(&self) -> bool {
        self.version == LATEST
    }
}

/// A request for one file inside a Javadoc archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavadocRequest {
    pub coordinate: ArchiveCoordinate,
    /// Everything after `!/`, matched verbatim against entry names
    pub inner_path: String,
}

impl JavadocRequest {
    /// Parse `/{repo}/javadoc/{category}/{g1}/{g2}/{artifact}/{version}!/{inner}`
    pub fn parse(path: &str) -> GatewayResult<Self> {
        let mut parts = path.split('!');
        let (Some(archive_part), Some(inner_part), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(GatewayError::BadRequest(format!(
                "Invalid javadoc request: {path}\n"
            )));
        };

        let components: Vec<&str> = archive_part.split('/').collect();
        if components.len() != JAVADOC_COMPONENTS {
            return Err(GatewayError::BadRequest(format!(
                "Invalid javadoc path: {path}\n"
            )));
        }

        let Some(inner_path) = inner_part.strip_prefix('/') else {
            return Err(GatewayError::BadRequest(format!(
                "Invalid javadoc request: {path}\n"
            )));
        };

        Ok(Self {
            coordinate: ArchiveCoordinate {
                category: components[3].to_string(),
                group: components[4..6].iter().map(|s| s.to_string()).collect(),
                artifact: components[6].to_string(),
                version: components[7].to_string(),
            },
            inner_path: inner_path.to_string(),
        })
    }
}

/// A request naming a dependency without a version (badge and usage page)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRequest {
    pub category: String,
    pub group: Vec<String>,
    pub artifact: String,
}

impl DependencyRequest {
    /// Parse `/{repo}/{kind}/{category}/{group...}/{artifact}`
    pub fn parse(path: &str) -> GatewayResult<Self> {
        let components: Vec<&str> = path.split('/').collect();
        if components.len() < DEPENDENCY_MIN_COMPONENTS {
            return Err(GatewayError::BadRequest(format!(
                "Invalid dependency path: {path}\n"
            )));
        }

        let category = components[3];
        if category != "releases" && category != "snapshots" {
            return Err(GatewayError::BadRequest(format!(
                "Invalid category, expect 'releases' or 'snapshots': {category}\n"
            )));
        }

        let (artifact, group) = components[4..]
            .split_last()
            .ok_or_else(|| GatewayError::BadRequest(format!("Invalid dependency path: {path}\n")))?;

        Ok(Self {
            category: category.to_string(),
            group: group.iter().map(|s| s.to_string()).collect(),
            artifact: artifact.to_string(),
        })
    }

    /// `group/artifact` below the category
    pub fn dependency_path(&self) -> String {
        let mut segments = self.group.clone();
        segments.push(self.artifact.clone());
        segments.join("/")
    }

    /// Maven groupId: the group segments joined with `.`
    pub fn group_id(&self) -> String {
        self.group.join(".")
    }
}

/// Percent-decode a request path; invalid UTF-8 is a bad request
pub fn decode_path(raw: &str) -> GatewayResult<String> {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| GatewayError::BadRequest(format!("Invalid request path: {raw}\n")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_archive_coordinate_and_inner_path() {
        let request =
            JavadocRequest::parse("/entrepot/javadoc/releases/org/example/lib_2.12/1.0.0!/org/example/Lib.html")
                .unwrap();

        assert_eq!(request.inner_path, "org/example/Lib.html");
        assert_eq!(request.coordinate.category, "releases");
        assert_eq!(request.coordinate.group, vec!["org", "example"]);
        assert_eq!(request.coordinate.artifact, "lib_2.12");
        assert_eq!(request.coordinate.version, "1.0.0");
        assert_eq!(
            request.coordinate.base_path(),
            "releases/org/example/lib_2.12/1.0.0"
        );
        assert_eq!(
            request.coordinate.archive_file_name(),
            "lib_2.12-1.0.0-javadoc.jar"
        );
    }

    #[test]
    fn requires_exactly_one_bang() {
        for path in [
            "/entrepot/javadoc/releases/org/example/lib/1.0.0/index.html",
            "/entrepot/javadoc/releases/org/example/lib/1.0.0!/a!/b",
        ] {
            let err = JavadocRequest::parse(path).unwrap_err();
            assert!(matches!(err, GatewayError::BadRequest(_)), "{path}");
        }
    }

    #[test]
    fn requires_eight_components_before_the_bang() {
        for path in [
            "/entrepot/javadoc/releases/g/a/1.0!/missing.txt",
            "/entrepot/javadoc/releases/org/example/sub/lib/1.0!/index.html",
            "/entrepot/javadoc/releases/org/example/lib/1.0/!/index.html",
        ] {
            let err = JavadocRequest::parse(path).unwrap_err();
            assert!(matches!(err, GatewayError::BadRequest(_)), "{path}");
        }
    }

    #[test]
    fn inner_path_must_follow_a_slash() {
        let err = JavadocRequest::parse("/entrepot/javadoc/releases/org/example/lib/1.0!index.html")
            .unwrap_err();
        assert!(matches!(err, GatewayError::BadRequest(_)));

        let request = JavadocRequest::parse("/entrepot/javadoc/releases/org/example/lib/1.0!/").unwrap();
        assert_eq!(request.inner_path, "");
    }

    #[test]
    fn inner_path_is_not_normalized() {
        let request =
            JavadocRequest::parse("/entrepot/javadoc/releases/org/example/lib/1.0!/a/../b.html").unwrap();
        assert_eq!(request.inner_path, "a/../b.html");
    }

    #[test]
    fn parses_dependency_paths() {
        let request = DependencyRequest::parse("/entrepot/pom/snapshots/org/example/tools/lib_2.13").unwrap();
        assert_eq!(request.category, "snapshots");
        assert_eq!(request.group_id(), "org.example.tools");
        assert_eq!(request.artifact, "lib_2.13");
        assert_eq!(request.dependency_path(), "org/example/tools/lib_2.13");
    }

    #[test]
    fn rejects_short_dependency_paths_and_unknown_categories() {
        assert!(DependencyRequest::parse("/entrepot/pom/releases/lib").is_err());
        let err = DependencyRequest::parse("/entrepot/pom/nightlies/org/lib").unwrap_err();
        assert!(err.to_string().contains("expect 'releases' or 'snapshots'"));
    }

    #[test]
    fn decodes_percent_escapes() {
        assert_eq!(decode_path("/a%20b/c%21").unwrap(), "/a b/c!");
        assert!(decode_path("/%FF%FE").is_err());
    }
}
