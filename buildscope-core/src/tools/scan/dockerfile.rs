use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::{collect_files, file_name, read_text, Findings};

pub const CLEAN: &str = "No Dockerfile security issues found.";

static CURL_PIPE_SHELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(curl|wget)\b[^|]*\|\s*(sudo\s+)?(ba|z)?sh\b").expect("curl pipe regex")
});

static SECRET_ENV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(ENV|ARG)\s+\S*(PASSWORD|PASSWD|SECRET|TOKEN|API_KEY|ACCESS_KEY)\S*[\s=]+\S+",
    )
    .expect("secret env regex")
});

pub fn is_dockerfile(path: &Path) -> bool {
    let name = file_name(path);
    name == "Dockerfile" || name.starts_with("Dockerfile.") || name.ends_with(".dockerfile")
}

pub fn check_dockerfile_security(root: &Path) -> String {
    let mut findings = Findings::new();
    let files = collect_files(root, &mut findings, is_dockerfile);

    for path in files {
        let Some(content) = read_text(&path, &mut findings) else {
            continue;
        };
        check_dockerfile(&path, &content, &mut findings);
    }

    findings.render(CLEAN)
}

fn check_dockerfile(path: &Path, content: &str, findings: &mut Findings) {
    let mut last_user: Option<(usize, String)> = None;
    // Lowercased `AS <name>` stage aliases seen so far.
    let mut stages: Vec<String> = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.splitn(2, char::is_whitespace);
        let instruction = parts.next().unwrap_or("").to_uppercase();
        let args = parts.next().unwrap_or("").trim();

        match instruction.as_str() {
            "FROM" => {
                let (image, alias) = parse_from(args);
                if let Some(image) = image {
                    if !stages.contains(&image.to_lowercase()) {
                        check_base_image(path, line_no, image, findings);
                    }
                }
                stages.extend(alias);
            }
            "USER" => {
                last_user = Some((line_no, args.to_string()));
            }
            "ADD" => {
                if args.contains("http://") || args.contains("https://") {
                    findings.push_line(
                        path,
                        line_no,
                        "ADD fetches a remote URL; prefer COPY or a verified download",
                    );
                }
            }
            _ => {}
        }

        if CURL_PIPE_SHELL_RE.is_match(line) {
            findings.push_line(path, line_no, "remote script piped into a shell");
        }
        if SECRET_ENV_RE.is_match(line) {
            findings.push_line(path, line_no, "secret value baked into the image via ENV/ARG");
        }
    }

    match last_user {
        None => findings.push(path, "no USER instruction; container runs as root"),
        Some((line_no, user)) if is_root_user(&user) => {
            findings.push_line(path, line_no, "container runs as root");
        }
        Some(_) => {}
    }
}

/// Image and optional stage alias of a `FROM [--flag...] <image> [AS <name>]` line.
fn parse_from(args: &str) -> (Option<&str>, Option<String>) {
    let mut tokens = args.split_whitespace().filter(|token| !token.starts_with("--"));
    let image = tokens.next();
    let alias = match (tokens.next(), tokens.next()) {
        (Some(keyword), Some(name)) if keyword.eq_ignore_ascii_case("as") => {
            Some(name.to_lowercase())
        }
        _ => None,
    };
    (image, alias)
}

fn check_base_image(path: &Path, line_no: usize, image: &str, findings: &mut Findings) {
    if image.eq_ignore_ascii_case("scratch") {
        return;
    }
    if image.ends_with(":latest") {
        findings.push_line(path, line_no, format!("base image {image} uses the latest tag"));
    } else if !image.contains(':') && !image.contains('@') {
        findings.push_line(
            path,
            line_no,
            format!("base image {image} is not pinned to a tag or digest"),
        );
    }
}

fn is_root_user(user: &str) -> bool {
    let name = user.split(':').next().unwrap_or("").trim();
    name == "root" || name == "0"
}
