/*============================================================
  Synavera Project: Syn-Repo
  Module: synrepo_core::topology
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Turn a pacman.conf style repository list and a mirrorlist
    into the Country → Mirror → Repo tree checked by the
    mirror pipeline.

  Security / Safety Notes:
    Pure text parsing; sources are opened through the resource
    module and never executed.

  Dependencies:
    serde for summary output.

  Operational Scope:
    Rebuilt from scratch on every mirror update; the previous
    tree is discarded by the store on commit.

  Revision History:
    2026-09-14 COD  Authored topology parser.
    2026-10-02 COD  Synthetic Default country for headless lists.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic ordering for reproducible output
    - Degenerate input absorbed without failure
============================================================*/

use std::cmp::Ordering;

use serde::Serialize;

use crate::config::MirrorConfig;
use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::logger::Logger;
use crate::resource::open_text;

/// Token in mirrorlist URLs standing for the repository name.
pub const REPO_PLACEHOLDER: &str = "$repo";
/// Staging repository checked even when the repository list omits it.
pub const BUILD_REPO: &str = "build";
/// Name prefix that sorts ahead of every other country.
pub const DEFAULT_COUNTRY: &str = "Default";

const RESERVED_SECTION: &str = "options";
const SERVER_KEY: &str = "Server = ";

/// Display grouping of mirrors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Country {
    pub name: String,
    pub mirrors: Vec<Mirror>,
}

/// One mirror, identified by its base URL with the placeholder stripped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mirror {
    pub url: String,
    pub online: bool,
    pub repos: Vec<Repo>,
}

/// Sync state of one repository on one mirror.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Repo {
    pub name: String,
    pub synced: bool,
    #[serde(skip)]
    pub fingerprint: Option<Fingerprint>,
}

impl Repo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            synced: false,
            fingerprint: None,
        }
    }
}

impl Mirror {
    /// Fresh mirror carrying one unsynced repo per repository name.
    pub fn new(url: impl Into<String>, repositories: &[String]) -> Self {
        Self {
            url: url.into(),
            online: false,
            repos: repositories.iter().map(Repo::new).collect(),
        }
    }

    /// Location of the binary index for `repo` on this mirror.
    pub fn index_url(&self, repo: &str) -> String {
        index_url(&self.url, repo)
    }
}

/// `<mirror-base><repo>/<repo>.db.tar.gz`; the base keeps whatever separator
/// the mirrorlist left after the placeholder was removed.
pub fn index_url(base: &str, repo: &str) -> String {
    format!("{base}{repo}/{repo}.db.tar.gz")
}

/// Complete mirror tree produced by one update run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Topology {
    pub repositories: Vec<String>,
    pub countries: Vec<Country>,
}

impl Topology {
    pub fn mirror_count(&self) -> usize {
        self.countries.iter().map(|c| c.mirrors.len()).sum()
    }

    pub fn online_count(&self) -> usize {
        self.mirrors().filter(|m| m.online).count()
    }

    pub fn mirrors(&self) -> impl Iterator<Item = &Mirror> {
        self.countries.iter().flat_map(|c| c.mirrors.iter())
    }

    pub fn mirrors_mut(&mut self) -> impl Iterator<Item = &mut Mirror> {
        self.countries.iter_mut().flat_map(|c| c.mirrors.iter_mut())
    }

    /// Locate a mirror by URL; a trailing slash is not significant.
    pub fn find_mirror(&self, url: &str) -> Option<&Mirror> {
        self.mirrors().find(|m| same_mirror(&m.url, url))
    }
}

/// Compare two mirror URLs ignoring trailing slashes.
pub fn same_mirror(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

/// Extract repository names from a pacman.conf style document.
pub fn parse_repo_list(text: &str) -> Vec<String> {
    let mut repos: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix('[')?.strip_suffix(']'))
        .filter(|name| *name != RESERVED_SECTION)
        .map(str::to_string)
        .collect();

    if !repos.iter().any(|r| r == BUILD_REPO) {
        repos.push(BUILD_REPO.to_string());
    }
    repos
}

/// Group mirrorlist servers by country, then sort the countries.
pub fn parse_mirror_list(text: &str, repositories: &[String]) -> Vec<Country> {
    let mut countries = Vec::new();
    let mut current = Country {
        name: DEFAULT_COUNTRY.to_string(),
        mirrors: Vec::new(),
    };

    for line in text.lines() {
        if let Some(idx) = line.find(SERVER_KEY) {
            let raw = line[idx + SERVER_KEY.len()..].trim();
            let url = raw.replacen(REPO_PLACEHOLDER, "", 1);
            current.mirrors.push(Mirror::new(url, repositories));
        } else if let Some(name) = line.strip_prefix('#') {
            let next = Country {
                name: name.trim().to_string(),
                mirrors: Vec::new(),
            };
            let finished = std::mem::replace(&mut current, next);
            if !finished.mirrors.is_empty() {
                countries.push(finished);
            }
        }
    }
    if !current.mirrors.is_empty() {
        countries.push(current);
    }

    sort_countries(&mut countries);
    countries
}

/// `Default*` countries first, then ascending by name.
pub fn sort_countries(countries: &mut [Country]) {
    countries.sort_by(|a, b| compare_country_names(&a.name, &b.name));
}

fn compare_country_names(a: &str, b: &str) -> Ordering {
    let a_default = a.starts_with(DEFAULT_COUNTRY);
    let b_default = b.starts_with(DEFAULT_COUNTRY);
    match (a_default, b_default) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.cmp(b),
    }
}

/// Open both list resources and build the unevaluated tree. Either source
/// failing to open aborts the mirror update.
pub async fn load_topology(
    client: &reqwest::Client,
    config: &MirrorConfig,
    logger: &Logger,
) -> Result<Topology> {
    let repo_text = open_text(client, &config.repo_list).await?;
    let repositories = parse_repo_list(&repo_text);
    logger.debug("REPOS", format!("Found repos: {}", repositories.join(", ")));

    let mirror_text = open_text(client, &config.mirror_list).await?;
    let countries = parse_mirror_list(&mirror_text, &repositories);
    for country in &countries {
        logger.debug(
            "MIRRORS",
            format!("{}: {} mirror(s)", country.name, country.mirrors.len()),
        );
    }

    Ok(Topology {
        repositories,
        countries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(countries: &[Country]) -> Vec<&str> {
        countries.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn repo_list_skips_options_and_appends_build() {
        let repos = parse_repo_list(
            "[options]\nArchitecture = auto\n\n[core]\nInclude = /etc/pacman.d/mirrorlist\n  [main]  \n# [disabled]\n",
        );
        assert_eq!(repos, vec!["core", "main", "build"]);
    }

    #[test]
    fn declared_build_repo_is_not_duplicated() {
        let repos = parse_repo_list("[build]\n[core]\n");
        assert_eq!(repos, vec!["build", "core"]);
    }

    #[test]
    fn mirror_list_groups_by_country_and_strips_placeholder() {
        let repos = vec!["core".to_string(), "build".to_string()];
        let countries = parse_mirror_list(
            "# Germany\nServer = https://de.example.org/kaos/$repo\n# Austria\nServer = http://at.example.org/$repo\nServer = http://at2.example.org/$repo/\n",
            &repos,
        );

        assert_eq!(names(&countries), vec!["Austria", "Germany"]);
        let austria = &countries[0];
        assert_eq!(austria.mirrors.len(), 2);
        assert_eq!(austria.mirrors[0].url, "http://at.example.org/");
        assert_eq!(austria.mirrors[1].url, "http://at2.example.org//");
        assert_eq!(countries[1].mirrors[0].url, "https://de.example.org/kaos/");
        let repo_names: Vec<&str> = austria.mirrors[0].repos.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(repo_names, vec!["core", "build"]);
        assert!(austria.mirrors[0].repos.iter().all(|r| !r.synced));
    }

    #[test]
    fn empty_countries_are_dropped() {
        let countries = parse_mirror_list(
            "# Empty\n# France\nServer = http://fr.example.org/$repo\n# Trailing\n",
            &["core".to_string()],
        );
        assert_eq!(names(&countries), vec!["France"]);
    }

    #[test]
    fn servers_before_any_header_land_in_default() {
        let countries = parse_mirror_list(
            "Server = http://main.example.org/repo/$repo\n# Brazil\nServer = http://br.example.org/$repo\n",
            &["core".to_string()],
        );
        assert_eq!(names(&countries), vec!["Default", "Brazil"]);
        assert_eq!(countries[0].mirrors[0].url, "http://main.example.org/repo/");
    }

    #[test]
    fn server_lines_need_spaced_assignment() {
        let countries = parse_mirror_list(
            "# Norway\nServer =http://no.example.org/$repo\nServer = http://no2.example.org/$repo\n",
            &["core".to_string()],
        );
        assert_eq!(countries[0].mirrors.len(), 1);
        assert_eq!(countries[0].mirrors[0].url, "http://no2.example.org/");
    }

    #[test]
    fn default_prefixed_country_sorts_first() {
        let mut countries: Vec<Country> = ["Germany", "Default region", "Austria"]
            .iter()
            .map(|name| Country {
                name: name.to_string(),
                mirrors: Vec::new(),
            })
            .collect();
        sort_countries(&mut countries);
        assert_eq!(names(&countries), vec!["Default region", "Austria", "Germany"]);
    }

    #[test]
    fn index_url_appends_repo_twice() {
        let mirror = Mirror::new("http://mirror.example.org/repo/", &[]);
        assert_eq!(
            mirror.index_url("core"),
            "http://mirror.example.org/repo/core/core.db.tar.gz"
        );
    }

    #[test]
    fn mirror_lookup_ignores_trailing_slash() {
        let topology = Topology {
            repositories: vec!["core".into()],
            countries: parse_mirror_list(
                "# Here\nServer = http://ref.example.org/repo/$repo\n",
                &["core".to_string()],
            ),
        };
        assert!(topology.find_mirror("http://ref.example.org/repo").is_some());
        assert!(topology.find_mirror("http://other.example.org/repo").is_none());
    }
}
