//! Newline-delimited wordlists of subdomain prefixes or web paths.
use std::path::Path;

use log::{info, warn};
use tokio::fs;

use crate::error::EngineError;

/// Prefixes tried when no subdomain wordlist is available.
pub const DEFAULT_SUBDOMAINS: &[&str] = &[
    "www", "mail", "ftp", "localhost", "webmail", "smtp", "pop", "ns1", "ns2", "dns", "dns1",
    "dns2", "mx", "mx1", "mx2", "blog", "dev", "www2", "admin", "forum", "news", "vpn", "ns3",
    "mail2", "new", "mysql", "old", "lists", "support", "mobile", "mx3", "wiki", "shop", "sql",
    "secure", "beta", "static", "jobs", "ads", "live", "stage", "staging", "app", "api", "cdn",
    "cloud", "git", "test", "demo", "portal", "host", "server", "web", "email", "images", "img",
    "media", "assets", "files", "download", "upload", "backup", "db", "database", "data", "cache",
    "proxy", "gateway", "auth", "sso", "login", "register", "account", "accounts", "user", "users",
    "member", "members", "client", "clients", "customer", "customers", "partner", "partners",
    "internal", "intranet", "extranet", "corp", "corporate", "hr", "finance", "sales", "marketing",
    "engineering", "ops", "operations", "devops", "docs", "documentation", "help", "helpdesk",
    "ticket", "tickets", "issue", "issues", "jira", "confluence", "slack", "chat", "meet",
    "meeting", "zoom", "calendar", "schedule", "crm", "erp", "inventory", "analytics", "stats",
    "status", "monitor", "monitoring", "health", "ping", "grafana", "kibana", "prometheus",
    "jenkins", "ci", "cd", "build", "release", "deploy", "prod", "production", "uat", "qa",
    "testing", "sandbox", "preview", "review",
];

/// Paths tried when no directory wordlist is available.
pub const DEFAULT_PATHS: &[&str] = &[
    "admin", "administrator", "login", "wp-admin", "wp-login.php", "dashboard", "panel", "cpanel",
    "api", "api/v1", "api/v2", "backup", "backups", "config", "uploads", "images", "img", "css",
    "js", "static", "assets", "includes", "tmp", "temp", "test", "dev", "old", "private",
    "robots.txt", "sitemap.xml", ".git", ".env", ".htaccess", "wp-content", "wp-includes",
    "phpmyadmin", "db", "database", "sql", "logs", "log", "server-status", "server-info",
    "info.php", "phpinfo.php", "info", "cgi-bin", "user", "users", "account", "register",
    "signup", "search", "docs", "documentation", "portal", "console", "manager", "install",
    "installation", "setup", "readme", "readme.txt", "readme.md", "changelog", "license",
    "license.txt", "version", "version.txt",
];

/// Ordered wordlist entries, blank lines and `#` comments removed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Wordlist {
    entries: Vec<String>,
}

impl Wordlist {
    /// Parses wordlist text, one trimmed entry per line. Only lines whose
    /// first character is `#` are comments.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .filter(|line| !line.starts_with('#'))
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn from_defaults(defaults: &[&str]) -> Self {
        Self {
            entries: defaults.iter().map(|&entry| entry.to_owned()).collect(),
        }
    }

    /// Reads a wordlist file.
    pub async fn read(path: &Path) -> Result<Self, EngineError> {
        let bytes = fs::read(path).await.map_err(|source| EngineError::Wordlist {
            path: path.to_path_buf(),
            source,
        })?;
        let content: String = bytes.utf8_chunks().map(|chunk| chunk.valid()).collect();
        Ok(Self::parse(&content))
    }

    /// Loads `path` if it exists, otherwise falls back to `defaults`.
    ///
    /// Fails only when there is neither a readable file nor a fallback, or
    /// when the result has no entries.
    pub async fn load(path: Option<&Path>, defaults: Option<&[&str]>) -> Result<Self, EngineError> {
        let wordlist = match (path, defaults) {
            (Some(path), Some(defaults)) if !path.exists() => {
                warn!("Wordlist not found at {}, using built-in defaults", path.display());
                Self::from_defaults(defaults)
            }
            (Some(path), _) => Self::read(path).await?,
            (None, Some(defaults)) => Self::from_defaults(defaults),
            (None, None) => return Err(EngineError::EmptyWorkList),
        };

        if wordlist.is_empty() {
            return Err(EngineError::EmptyWorkList);
        }
        info!("Loaded {} wordlist entries", wordlist.len());
        Ok(wordlist)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

impl IntoIterator for Wordlist {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
