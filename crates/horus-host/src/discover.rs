//! Import discovery over notebook code and interpreter probing.

use std::collections::BTreeSet;
use std::time::Duration;

use horus_lockfile::{Pipfile, Requirement};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;

use crate::error::{HorusError, HorusResult};
use crate::process;

static IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^import\s+(.+)$").expect("import regex"));
static FROM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^from\s+([A-Za-z_][\w.]*)\s+import\b").expect("from-import regex"));

/// Top-level modules shipped with CPython.
const STDLIB_MODULES: &[&str] = &[
    "__future__", "_thread", "abc", "argparse", "array", "ast", "asyncio", "atexit", "base64",
    "binascii", "bisect", "builtins", "bz2", "calendar", "cmath", "cmd", "codecs", "collections",
    "colorsys", "concurrent", "configparser", "contextlib", "contextvars", "copy", "copyreg",
    "csv", "ctypes", "curses", "dataclasses", "datetime", "dbm", "decimal", "difflib", "dis",
    "doctest", "email", "encodings", "enum", "errno", "faulthandler", "fcntl", "filecmp",
    "fileinput", "fnmatch", "fractions", "ftplib", "functools", "gc", "getopt", "getpass",
    "gettext", "glob", "graphlib", "grp", "gzip", "hashlib", "heapq", "hmac", "html", "http",
    "imaplib", "importlib", "inspect", "io", "ipaddress", "itertools", "json", "keyword",
    "linecache", "locale", "logging", "lzma", "mailbox", "marshal", "math", "mimetypes", "mmap",
    "multiprocessing", "netrc", "numbers", "operator", "optparse", "os", "pathlib", "pdb",
    "pickle", "pkgutil", "platform", "plistlib", "poplib", "posixpath", "pprint", "profile",
    "pstats", "pty", "pwd", "queue", "quopri", "random", "re", "readline", "reprlib",
    "resource", "rlcompleter", "runpy", "sched", "secrets", "select", "selectors", "shelve",
    "shlex", "shutil", "signal", "site", "smtplib", "socket", "socketserver", "sqlite3", "ssl",
    "stat", "statistics", "string", "stringprep", "struct", "subprocess", "symtable", "sys",
    "sysconfig", "syslog", "tabnanny", "tarfile", "tempfile", "termios", "textwrap", "threading",
    "time", "timeit", "tkinter", "token", "tokenize", "tomllib", "trace", "traceback",
    "tracemalloc", "tty", "turtle", "types", "typing", "unicodedata", "unittest", "urllib",
    "uuid", "venv", "warnings", "wave", "weakref", "webbrowser", "winreg", "wsgiref", "xml",
    "xmlrpc", "zipapp", "zipfile", "zipimport", "zlib", "zoneinfo",
];

/// Import names whose distribution is published under another name.
const DISTRIBUTION_ALIASES: &[(&str, &str)] = &[
    ("PIL", "Pillow"),
    ("bs4", "beautifulsoup4"),
    ("cv2", "opencv-python"),
    ("dateutil", "python-dateutil"),
    ("dotenv", "python-dotenv"),
    ("jwt", "PyJWT"),
    ("sklearn", "scikit-learn"),
    ("skimage", "scikit-image"),
    ("yaml", "PyYAML"),
];

/// Third-party distributions imported by `source`, sorted and unique.
pub fn gather_libraries(source: &str) -> Vec<String> {
    let mut modules = BTreeSet::new();
    for line in source.lines() {
        let line = line.trim();
        if line.starts_with(['%', '!', '#']) {
            continue;
        }
        if let Some(caps) = FROM_RE.captures(line) {
            modules.insert(top_level(&caps[1]).to_string());
        } else if let Some(caps) = IMPORT_RE.captures(line) {
            let names = caps[1].split('#').next().unwrap_or_default();
            for item in names.split(',') {
                let name = item.split_whitespace().next().unwrap_or_default();
                if !name.is_empty() {
                    modules.insert(top_level(name).to_string());
                }
            }
        }
    }
    modules
        .into_iter()
        .filter(|module| is_identifier(module) && !STDLIB_MODULES.contains(&module.as_str()))
        .map(|module| distribution_name(&module))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn top_level(module: &str) -> &str {
    module.split('.').next().unwrap_or(module)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn distribution_name(module: &str) -> String {
    DISTRIBUTION_ALIASES
        .iter()
        .find(|(import, _)| *import == module)
        .map(|(_, dist)| dist.to_string())
        .unwrap_or_else(|| module.to_string())
}

/// Manifest requiring any version of each package.
pub fn pipfile_for_libraries(libraries: &[String], python_version: Option<&str>) -> Pipfile {
    let mut pipfile = Pipfile::new(python_version);
    for library in libraries {
        pipfile
            .packages
            .insert(library.clone(), Requirement::Version("*".into()));
    }
    pipfile
}

/// `major.minor` of the given interpreter.
pub async fn discover_python_version(python: &str, timeout: Duration) -> HorusResult<String> {
    let mut command = Command::new(python);
    command.arg("-c").arg(
        "import sys; print('{}.{}'.format(sys.version_info.major, sys.version_info.minor))",
    );
    let output = process::run(command, timeout).await?;
    if !output.success() {
        return Err(HorusError::Process(format!(
            "python version discovery failed: {}",
            output.failure_detail()
        )));
    }
    let version = output.stdout.trim().to_string();
    if version.is_empty() {
        return Err(HorusError::Process("python printed no version".into()));
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
import os, sys
import numpy as np
from sklearn.model_selection import train_test_split
from . import local
import yaml  # config
%matplotlib inline
!pip install pandas
import pandas.io.sql, requests
from collections import OrderedDict
";

    #[test]
    fn gathers_third_party_imports() {
        assert_eq!(
            gather_libraries(SOURCE),
            vec!["PyYAML", "numpy", "pandas", "requests", "scikit-learn"]
        );
    }

    #[test]
    fn empty_source_has_no_libraries() {
        assert!(gather_libraries("print('hi')\n").is_empty());
    }

    #[test]
    fn builds_pipfile_from_libraries() {
        let pipfile = pipfile_for_libraries(&["numpy".to_string()], Some("3.9"));
        assert_eq!(pipfile.packages["numpy"].version(), Some("*"));
        assert_eq!(pipfile.python_version(), Some("3.9"));
    }
}
