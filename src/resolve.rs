//! Package name to source files, following `go/build` conventions.

use std::env;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::constraint;
use crate::error::ResolveError;
use crate::scanner::scan;
use crate::token::{Keyword, LineTable, Op, TokenKind};

const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle",
    "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

/// Newest `go1.N` release tag considered satisfied.
const GO_MINOR: u32 = 22;

/// Target platform and search roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    pub goos: String,
    pub goarch: String,
    pub goroot: Option<PathBuf>,
    pub gopath: Vec<PathBuf>,
    pub cgo_enabled: bool,
}

impl BuildContext {
    /// Read `GOOS`, `GOARCH`, `GOROOT`, `GOPATH` and `CGO_ENABLED`, falling
    /// back to the host platform and `$HOME/go`.
    pub fn from_env() -> Self {
        let host_os = host_os();
        let host_arch = host_arch();
        let goos = non_empty_var("GOOS").unwrap_or_else(|| host_os.to_string());
        let goarch = non_empty_var("GOARCH").unwrap_or_else(|| host_arch.to_string());
        let goroot = non_empty_var("GOROOT").map(PathBuf::from);
        let gopath = match env::var_os("GOPATH").filter(|v| !v.is_empty()) {
            Some(value) => env::split_paths(&value)
                .filter(|p| !p.as_os_str().is_empty())
                .collect(),
            None => env::var_os("HOME")
                .map(|home| vec![PathBuf::from(home).join("go")])
                .unwrap_or_default(),
        };
        let cgo_enabled = match non_empty_var("CGO_ENABLED").as_deref() {
            Some(value) => value == "1",
            None => goos == host_os && goarch == host_arch,
        };
        Self {
            goos,
            goarch,
            goroot,
            gopath,
            cgo_enabled,
        }
    }

    /// Whether a build tag is satisfied.
    pub fn match_tag(&self, name: &str) -> bool {
        if name == "cgo" {
            return self.cgo_enabled;
        }
        if name == self.goos || name == self.goarch || name == "gc" {
            return true;
        }
        match (self.goos.as_str(), name) {
            ("android", "linux") | ("illumos", "solaris") | ("ios", "darwin") => return true,
            _ => {}
        }
        if name == "unix" && UNIX_OS.contains(&self.goos.as_str()) {
            return true;
        }
        name.strip_prefix("go1.")
            .and_then(|minor| minor.parse::<u32>().ok())
            .is_some_and(|minor| (1..=GO_MINOR).contains(&minor))
    }

    /// Filename suffixes: `name_GOOS.go`, `name_GOARCH.go` and
    /// `name_GOOS_GOARCH.go` (optionally followed by `_test`).
    pub fn good_os_arch_file(&self, name: &str) -> bool {
        let stem = name.split('.').next().unwrap_or(name);
        let Some(underscore) = stem.find('_') else {
            return true;
        };
        let mut parts: Vec<&str> = stem[underscore..].split('_').collect();
        if parts.last() == Some(&"test") {
            parts.pop();
        }
        let n = parts.len();
        if n >= 2 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
            return self.match_tag(parts[n - 1]) && self.match_tag(parts[n - 2]);
        }
        if n >= 1 && (KNOWN_OS.contains(&parts[n - 1]) || KNOWN_ARCH.contains(&parts[n - 1])) {
            return self.match_tag(parts[n - 1]);
        }
        true
    }

    fn matches_header(&self, name: &str, src: &str) -> bool {
        match constraint::file_constraint(src) {
            Ok(Some(expr)) => expr.eval(&mut |tag| self.match_tag(tag)),
            Ok(None) => true,
            Err(message) => {
                warn!("skipping {name}: {message}");
                false
            }
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn host_os() -> &'static str {
    match env::consts::OS {
        "macos" => "darwin",
        os => os,
    }
}

fn host_arch() -> &'static str {
    match env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" if cfg!(target_endian = "little") => "ppc64le",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        "wasm32" => "wasm",
        arch => arch,
    }
}

fn is_local(package: &str) -> bool {
    package == "."
        || package == ".."
        || package.starts_with("./")
        || package.starts_with("../")
        || Path::new(package).is_absolute()
}

/// The buildable, non-test Go files of `package`, in name order.
///
/// Local paths are taken relative to the working directory; import paths
/// are searched under `$GOROOT/src` and every `$GOPATH/src`. Files of
/// directory `.` are returned as bare names.
pub fn resolve(package: &str, ctx: &BuildContext) -> Result<Vec<PathBuf>, ResolveError> {
    let dir = if is_local(package) {
        let dir = path_clean::clean(package);
        if !dir.exists() {
            return Err(ResolveError::LocalNotFound {
                package: package.to_string(),
                dir: dir.display().to_string(),
            });
        }
        dir
    } else {
        find_import(package, ctx)?
    };
    if !dir.is_dir() {
        return Err(ResolveError::NotADirectory {
            dir: dir.display().to_string(),
        });
    }
    debug!("resolving {package} in {}", dir.display());

    let mut package_name: Option<(String, String)> = None;
    let mut files = Vec::new();
    for name in list_go_files(&dir)? {
        if name.starts_with('_') || name.starts_with('.') || name.ends_with("_test.go") {
            continue;
        }
        if !ctx.good_os_arch_file(&name) {
            debug!("skipping {name}: GOOS/GOARCH suffix");
            continue;
        }
        let path = dir.join(&name);
        let bytes = std::fs::read(&path).map_err(|source| ResolveError::Read {
            path: path.display().to_string(),
            source,
        })?;
        // invalid UTF-8 is reported when the file itself is read for rewriting
        let src = String::from_utf8_lossy(&bytes);
        if !ctx.matches_header(&name, &src) {
            debug!("skipping {name}: build constraints");
            continue;
        }

        match scan_header(&src) {
            Some(header) => {
                if header.imports_c {
                    debug!("skipping {name}: imports \"C\"");
                    continue;
                }
                if header.package == "documentation" {
                    continue;
                }
                if let Some((first, first_file)) = &package_name {
                    if *first != header.package {
                        return Err(ResolveError::MultiplePackages {
                            dir: dir.display().to_string(),
                            first: first.clone(),
                            first_file: first_file.clone(),
                            second: header.package,
                            second_file: name,
                        });
                    }
                } else {
                    package_name = Some((header.package, name.clone()));
                }
            }
            None => debug!("{name}: unreadable header, leaving it to the parser"),
        }

        files.push(if dir == Path::new(".") {
            PathBuf::from(name)
        } else {
            path
        });
    }

    if files.is_empty() {
        return Err(ResolveError::NoGoFiles {
            dir: dir.display().to_string(),
        });
    }
    debug!("{package}: {} file(s)", files.len());
    Ok(files)
}

fn find_import(package: &str, ctx: &BuildContext) -> Result<PathBuf, ResolveError> {
    let mut searched = Vec::new();
    let roots = ctx
        .goroot
        .iter()
        .map(|root| (root, "$GOROOT"))
        .chain(ctx.gopath.iter().map(|root| (root, "$GOPATH")));
    for (root, source) in roots {
        let dir = root.join("src").join(package);
        if dir.is_dir() {
            return Ok(dir);
        }
        searched.push(format!("{} (from {source})", dir.display()));
    }
    Err(ResolveError::NotFound {
        package: package.to_string(),
        searched: searched.join(", "),
    })
}

/// Names of the regular `*.go` files in `dir`, sorted.
fn list_go_files(dir: &Path) -> Result<Vec<String>, ResolveError> {
    let pattern = format!(
        "{}/*.go",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let entries = glob::glob(&pattern).map_err(|source| ResolveError::Pattern {
        dir: dir.display().to_string(),
        source,
    })?;
    let mut names = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ResolveError::List {
            dir: dir.display().to_string(),
            source: std::io::Error::from(e),
        })?;
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

struct Header {
    package: String,
    imports_c: bool,
}

/// Package name and cgo use, from the tokens before the first
/// non-import declaration. `None` when the header does not scan.
fn scan_header(src: &str) -> Option<Header> {
    let lines = LineTable::new(src);
    let tokens = scan(src, &lines).ok()?.tokens;
    let mut iter = tokens.iter().filter(|t| !t.is_semicolon()).peekable();

    if !iter.next()?.is_keyword(Keyword::Package) {
        return None;
    }
    let name = iter.next().filter(|t| t.kind == TokenKind::Ident)?;
    let mut header = Header {
        package: name.text.clone(),
        imports_c: false,
    };

    while iter.next_if(|t| t.is_keyword(Keyword::Import)).is_some() {
        let grouped = iter.next_if(|t| t.is_op(Op::LParen)).is_some();
        loop {
            let Some(tok) = iter.next() else {
                return Some(header);
            };
            match tok.kind {
                TokenKind::String => {
                    header.imports_c |= tok.text == "\"C\"" || tok.text == "`C`";
                    if !grouped {
                        break;
                    }
                }
                TokenKind::Op(Op::RParen) if grouped => break,
                _ => {}
            }
        }
    }
    Some(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn linux() -> BuildContext {
        BuildContext {
            goos: "linux".into(),
            goarch: "amd64".into(),
            goroot: None,
            gopath: Vec::new(),
            cgo_enabled: true,
        }
    }

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn tags_match_platform() {
        let ctx = linux();
        assert!(ctx.match_tag("linux"));
        assert!(ctx.match_tag("amd64"));
        assert!(ctx.match_tag("unix"));
        assert!(ctx.match_tag("gc"));
        assert!(ctx.match_tag("cgo"));
        assert!(ctx.match_tag("go1.18"));
        assert!(!ctx.match_tag("go1.99"));
        assert!(!ctx.match_tag("windows"));
        assert!(!ctx.match_tag("ignore"));

        let android = BuildContext {
            goos: "android".into(),
            ..linux()
        };
        assert!(android.match_tag("linux"));
    }

    #[test]
    fn filename_suffixes() {
        let ctx = linux();
        assert!(ctx.good_os_arch_file("file.go"));
        assert!(ctx.good_os_arch_file("file_linux.go"));
        assert!(ctx.good_os_arch_file("file_linux_amd64.go"));
        assert!(ctx.good_os_arch_file("file_amd64_test.go"));
        assert!(ctx.good_os_arch_file("some_thing.go"));
        assert!(!ctx.good_os_arch_file("file_windows.go"));
        assert!(!ctx.good_os_arch_file("file_linux_arm64.go"));
        assert!(!ctx.good_os_arch_file("file_darwin_amd64.go"));
        // a lone OS-looking name is not a suffix
        assert!(ctx.good_os_arch_file("windows.go"));
    }

    #[test]
    fn resolve_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        write(dir, "b.go", "package hello\n");
        write(dir, "a.go", "package hello\n");
        write(dir, "a_test.go", "package hello\n");
        write(dir, "_skip.go", "package hello\n");
        write(dir, ".hidden.go", "package hello\n");
        write(dir, "x_windows.go", "package hello\n");
        write(dir, "ignored.go", "//go:build ignore\n\npackage main\n");
        write(dir, "cgo.go", "package hello\n\nimport \"C\"\n");
        write(dir, "notes.txt", "package hello\n");
        fs::create_dir(dir.join("sub.go")).unwrap();

        let files = resolve(dir.to_str().unwrap(), &linux()).unwrap();
        assert_eq!(names(&files), vec!["a.go", "b.go"]);
        assert_eq!(files[0], dir.join("a.go"));
    }

    #[test]
    fn resolve_import_path_under_gopath() {
        let tmp = TempDir::new().unwrap();
        let pkg = tmp.path().join("src/example.com/hello");
        fs::create_dir_all(&pkg).unwrap();
        write(&pkg, "hello.go", "package hello\n");
        let ctx = BuildContext {
            gopath: vec![tmp.path().to_path_buf()],
            ..linux()
        };
        let files = resolve("example.com/hello", &ctx).unwrap();
        assert_eq!(files, vec![pkg.join("hello.go")]);
    }

    #[test]
    fn resolve_unknown_import_path() {
        let tmp = TempDir::new().unwrap();
        let ctx = BuildContext {
            gopath: vec![tmp.path().to_path_buf()],
            ..linux()
        };
        let err = resolve("example.com/missing", &ctx).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }), "Got: {err}");
        assert!(err.to_string().contains("example.com/missing"));
    }

    #[test]
    fn resolve_errors() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();

        let err = resolve(dir.join("nope").to_str().unwrap(), &linux()).unwrap_err();
        assert!(matches!(err, ResolveError::LocalNotFound { .. }), "Got: {err}");

        write(dir, "file.go", "package a\n");
        let err = resolve(dir.join("file.go").to_str().unwrap(), &linux()).unwrap_err();
        assert!(matches!(err, ResolveError::NotADirectory { .. }), "Got: {err}");

        let empty = dir.join("empty");
        fs::create_dir(&empty).unwrap();
        let err = resolve(empty.to_str().unwrap(), &linux()).unwrap_err();
        assert!(matches!(err, ResolveError::NoGoFiles { .. }), "Got: {err}");

        write(dir, "other.go", "package b\n");
        let err = resolve(dir.to_str().unwrap(), &linux()).unwrap_err();
        assert!(
            matches!(err, ResolveError::MultiplePackages { .. }),
            "Got: {err}"
        );
        assert!(err.to_string().contains("a (file.go) and b (other.go)"));
    }

    #[test]
    fn unscannable_header_is_kept() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "bad.go", "package p\n\nvar s = \"unterminated\n");
        let files = resolve(tmp.path().to_str().unwrap(), &linux()).unwrap();
        assert_eq!(names(&files), vec!["bad.go"]);
    }

    #[test]
    fn invalid_utf8_is_kept() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("latin1.go"), b"package p\n\n// caf\xe9\nvar X = 1\n").unwrap();
        let files = resolve(tmp.path().to_str().unwrap(), &linux()).unwrap();
        assert_eq!(names(&files), vec!["latin1.go"]);
    }

    #[test]
    fn header_scan_finds_package_and_cgo() {
        let header =
            scan_header("package p\n\nimport (\n\t\"fmt\"\n\t\"C\"\n)\n\nfunc f() {}\n").unwrap();
        assert_eq!(header.package, "p");
        assert!(header.imports_c);

        let header = scan_header("package q\nimport x \"fmt\"\nimport \"os\"\n").unwrap();
        assert_eq!(header.package, "q");
        assert!(!header.imports_c);

        assert!(scan_header("func f() {}\n").is_none());
    }

    #[test]
    fn local_paths() {
        assert!(is_local("."));
        assert!(is_local("./testdata"));
        assert!(is_local("../x"));
        assert!(is_local("/abs/path"));
        assert!(!is_local("fmt"));
        assert!(!is_local("example.com/x"));
    }
}
