//! Request header generation.
//!
//! Generates a browsing-like workload whose compressibility is visible in the
//! metrics: a few hosts, a stable set of client headers, occasional cookies,
//! and paths that rarely repeat.
//!
//! # Design
//!
//! Each request has:
//! - Pseudo-headers, with `:path` almost always unique
//! - Per-host headers that repeat for every request to that host
//! - Sometimes a session cookie, rotating now and then to churn the table

use qpack_sim_core::Header;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/128.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_5) AppleWebKit/605.1.15 Safari/605.1.15",
];

const ACCEPTS: &[&str] = &[
    "text/html,application/xhtml+xml",
    "image/avif,image/webp,*/*",
    "text/css,*/*;q=0.1",
    "*/*",
];

const EXTENSIONS: &[&str] = &["html", "js", "css", "png", "woff2", "json"];

/// Generate `count` request header sets.
///
/// # Arguments
/// - `seed`: random seed for determinism
/// - `count`: number of requests
/// - `hosts`: number of distinct `:authority` values (at least 1)
pub fn generate_requests(seed: u64, count: usize, hosts: usize) -> Vec<Vec<Header>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let hosts = hosts.max(1);
    let user_agent = USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0]);
    let mut session: u32 = rng.gen();

    (0..count)
        .map(|i| {
            let host = rng.gen_range(0..hosts);
            let ext = EXTENSIONS.choose(&mut rng).copied().unwrap_or("html");
            let accept = ACCEPTS.choose(&mut rng).copied().unwrap_or("*/*");

            let mut headers = vec![
                Header::new(":method", "GET"),
                Header::new(":scheme", "https"),
                Header::new(":authority", format!("static{host}.example.com")),
                Header::new(":path", format!("/assets/{i}/{:08x}.{ext}", rng.gen::<u32>())),
                Header::new("user-agent", user_agent),
                Header::new("accept", accept),
                Header::new("accept-encoding", "gzip, deflate, br"),
            ];

            // 10% of requests rotate the session
            if rng.gen_range(0..10) == 0 {
                session = rng.gen();
            }
            if rng.gen_bool(0.6) {
                headers.push(Header::new("cookie", format!("sid={session:08x}")));
            }

            headers
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_count() {
        assert_eq!(generate_requests(42, 100, 3).len(), 100);
        assert!(generate_requests(42, 0, 3).is_empty());
    }

    #[test]
    fn test_determinism() {
        assert_eq!(generate_requests(12345, 50, 4), generate_requests(12345, 50, 4));
    }

    #[test]
    fn test_different_seeds() {
        assert_ne!(generate_requests(1, 20, 4), generate_requests(2, 20, 4));
    }

    #[test]
    fn test_hosts_bounded() {
        for request in generate_requests(7, 200, 2) {
            let authority = request
                .iter()
                .find(|h| h.name == ":authority")
                .map(|h| h.value.clone())
                .unwrap();
            assert!(authority == "static0.example.com" || authority == "static1.example.com");
        }
    }

    #[test]
    fn test_zero_hosts_treated_as_one() {
        let requests = generate_requests(3, 10, 0);
        assert!(requests
            .iter()
            .all(|r| r.iter().any(|h| h.value == "static0.example.com")));
    }
}
