use lazydfa::{Config, ErrorKind, PikeVm, ReverseLimited, DFA};

use lazydfa::nfa::NFA;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn dfa(pattern: &str) -> DFA {
    DFA::new(pattern).unwrap()
}

fn rdfa(pattern: &str) -> DFA {
    DFA::new_reverse(pattern).unwrap()
}

fn vm(pattern: &str) -> PikeVm {
    PikeVm::new(NFA::new(pattern).unwrap())
}

fn rvm(pattern: &str) -> PikeVm {
    PikeVm::new(NFA::new_reverse(pattern).unwrap())
}

mod scenarios {
    use super::*;

    #[test]
    fn literal_find() {
        init();
        let mut re = dfa("hello");
        assert_eq!(re.find(b"say hello world"), Some(9));
        assert!(re.is_match(b"say hello world"));
        // The raw loop agrees with the prefiltered entry point.
        assert_eq!(re.search_at(b"say hello world", 0), Some(9));
    }

    #[test]
    fn repetitions() {
        init();
        let mut re = dfa("a+b+c+");
        assert_eq!(re.find(b"xxxaaabbbcccxxx"), Some(12));
    }

    #[test]
    fn line_anchor() {
        init();
        let mut re = dfa("^hello");
        assert_eq!(re.find(b"hello world"), Some(5));
        assert_eq!(re.find_at(b"say hello world", 4), None);
    }

    #[test]
    fn word_boundaries_anchored() {
        init();
        let mut re = dfa(r"\bfoo\b");
        assert_eq!(re.search_at_anchored(b" foo bar", 1), Some(4));
        assert_eq!(re.find(b" xfoox "), None);
    }

    #[test]
    fn boundary_resolved_at_end_of_input() {
        init();
        let mut re = dfa(r"test\b");
        assert_eq!(re.find(b"test"), Some(4));
    }

    #[test]
    fn empty_capable_pattern() {
        init();
        let mut re = dfa("a*");
        assert_eq!(re.find(b""), Some(0));
        assert_eq!(re.find(b"abc"), Some(3));
    }

    #[test]
    fn reverse_search() {
        init();
        let mut re = rdfa("[a-z]+");
        assert_eq!(re.search_reverse(b"123abc456", 0, 6), Some(3));
    }

    #[test]
    fn tiny_cache_still_correct() {
        init();
        let config = Config::new().max_states(5).max_cache_clears(10);
        let mut re = DFA::with_config(config, "a+b+c+d+").unwrap();
        assert_eq!(re.find(b"aaaabbbbccccdddd"), Some(16));
        assert!(re.fallback_count() >= 1);
        // The cache recovered; the DFA keeps working afterwards.
        assert_eq!(re.find(b"abcd"), Some(4));
        assert_eq!(re.find(b"abc"), None);
    }
}

mod equivalence {
    use super::*;

    const PATTERNS: &[&str] = &[
        "",
        "hello",
        "a+b+c+",
        "^hello",
        "foo$",
        r"\bfoo\b",
        "a*",
        "ab|abc",
        "ab|cd",
        "[a-z]+",
        "a?a",
        r"\Afoo",
        r"test\b",
        "a{2,4}",
        "(foo|bar)baz",
        "x[0-9]+y",
        r"\w+@\w+",
        "[^a]*a",
        r"abc\z",
        "a.c",
    ];

    const HAYSTACKS: &[&[u8]] = &[
        b"",
        b"a",
        b"aa",
        b"abc",
        b"hello",
        b"say hello world",
        b"say hello and hello",
        b"xxxaaabbbcccxxx",
        b"hello world",
        b" foo bar",
        b" xfoox ",
        b"foo",
        b"xfoo",
        b"123abc456",
        b"ab\ncd",
        b"foo\nbar",
        b"test",
        b"tester",
        b"x123y x45y",
        b"user@example.com",
        b"aaaa",
        b"abab",
        b"zzzzza",
        b"abXcd",
        b"\nhello",
        b"a\r\nb",
        b"foobaz barbaz",
    ];

    /// The DFA and the PikeVM must agree everywhere, since searches hop
    /// between them mid-flight.
    #[test]
    fn forward_agrees_with_pikevm() {
        init();
        for pattern in PATTERNS {
            let mut re = dfa(pattern);
            let mut vm = vm(pattern);
            for h in HAYSTACKS {
                let expected = vm.search_at(h, 0).map(|(_, e)| e);
                assert_eq!(
                    re.search_at(h, 0),
                    expected,
                    "search_at: pattern {:?} on {:?}",
                    pattern,
                    std::str::from_utf8(h).unwrap(),
                );
                assert_eq!(
                    re.find(h),
                    expected,
                    "find: pattern {:?} on {:?}",
                    pattern,
                    std::str::from_utf8(h).unwrap(),
                );
                assert_eq!(
                    re.is_match(h),
                    vm.is_match_at(h, 0),
                    "is_match: pattern {:?} on {:?}",
                    pattern,
                    std::str::from_utf8(h).unwrap(),
                );
            }
        }
    }

    #[test]
    fn anchored_agrees_with_pikevm() {
        init();
        for pattern in PATTERNS {
            let mut re = dfa(pattern);
            let mut vm = vm(pattern);
            for h in HAYSTACKS {
                for at in 0..=h.len() {
                    assert_eq!(
                        re.search_at_anchored(h, at),
                        vm.search_at_anchored(h, at).map(|(_, e)| e),
                        "anchored at {}: pattern {:?} on {:?}",
                        at,
                        pattern,
                        std::str::from_utf8(h).unwrap(),
                    );
                }
            }
        }
    }

    #[test]
    fn reverse_agrees_with_pikevm() {
        init();
        for pattern in PATTERNS {
            let mut re = rdfa(pattern);
            let mut vm = rvm(pattern);
            for h in HAYSTACKS {
                assert_eq!(
                    re.search_reverse(h, 0, h.len()),
                    vm.search_reverse(h, 0, h.len()),
                    "reverse: pattern {:?} on {:?}",
                    pattern,
                    std::str::from_utf8(h).unwrap(),
                );
                assert_eq!(
                    re.is_match_reverse(h, 0, h.len()),
                    vm.is_match_reverse(h, 0, h.len()),
                    "is_match_reverse: pattern {:?} on {:?}",
                    pattern,
                    std::str::from_utf8(h).unwrap(),
                );
            }
        }
    }

    /// Reverse correspondence: scanning backward from a forward match end
    /// recovers that match's start.
    #[test]
    fn reverse_recovers_match_starts() {
        init();
        for pattern in ["hello", "a+b+c+", "[a-z]+", "x[0-9]+y"] {
            let mut fwd = dfa(pattern);
            let mut rev = rdfa(pattern);
            let mut vm = vm(pattern);
            for h in HAYSTACKS {
                let end = match fwd.search_at(h, 0) {
                    None => continue,
                    Some(end) => end,
                };
                let (start, _) = vm.search_at(h, 0).unwrap();
                assert_eq!(
                    rev.search_reverse(h, 0, end),
                    Some(start),
                    "pattern {:?} on {:?}",
                    pattern,
                    std::str::from_utf8(h).unwrap(),
                );
            }
        }
    }
}

mod cache_behavior {
    use super::*;

    /// Results never depend on what a previous search left in the cache.
    #[test]
    fn cache_determinism() {
        init();
        for pattern in ["hello", "a+b+c+", r"\bfoo\b", "[a-z]+"] {
            let mut warm = dfa(pattern);
            for _ in 0..2 {
                for h in [
                    b"say hello world".as_slice(),
                    b"xxxaaabbbcccxxx",
                    b" foo bar",
                    b"123abc456",
                    b"",
                ] {
                    let mut cold = dfa(pattern);
                    assert_eq!(
                        warm.search_at(h, 0),
                        cold.search_at(h, 0),
                        "pattern {:?} on {:?}",
                        pattern,
                        std::str::from_utf8(h).unwrap(),
                    );
                }
            }
        }
    }

    /// Cache clears are invisible in results: a tiny cache with a clear
    /// budget answers exactly like an effectively unbounded one.
    #[test]
    fn clear_transparency() {
        init();
        for pattern in ["hello", "a+b+c+", "[a-z]+", "(foo|bar)baz"] {
            let mut big = dfa(pattern);
            let mut tiny = DFA::with_config(
                Config::new().max_states(3).max_cache_clears(1),
                pattern,
            )
            .unwrap();
            let mut no_recovery = DFA::with_config(
                Config::new().max_states(3).max_cache_clears(0),
                pattern,
            )
            .unwrap();
            for h in [
                b"say hello world".as_slice(),
                b"xxxaaabbbcccxxx",
                b"123abc456",
                b"foobaz barbaz",
            ] {
                let expected = big.search_at(h, 0);
                assert_eq!(tiny.search_at(h, 0), expected);
                assert_eq!(no_recovery.search_at(h, 0), expected);
            }
        }
    }

    #[test]
    fn stats_track_lookups() {
        init();
        let mut re = dfa("a+b+c+");
        let before = re.cache_stats();
        assert_eq!(before.size, 1, "only the canonical start is cached");

        re.search_at(b"xxxaaabbbcccxxx", 0);
        let after = re.cache_stats();
        assert!(after.size > 1);
        assert!(after.misses > 0);
        assert_eq!(after.capacity, Config::new().get_max_states());

        // A second identical search reuses every cached transition, so
        // the key-lookup counters stay put.
        re.search_at(b"xxxaaabbbcccxxx", 0);
        let again = re.cache_stats();
        assert_eq!(again.misses, after.misses);
        assert_eq!(again.size, after.size);
    }

    #[test]
    fn reset_cache_starts_over() {
        init();
        let mut re = dfa("a+b+c+");
        re.search_at(b"xxxaaabbbcccxxx", 0);
        assert!(re.cache_stats().size > 1);

        re.reset_cache();
        let stats = re.cache_stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);

        assert_eq!(re.search_at(b"xxxaaabbbcccxxx", 0), Some(12));
    }

    #[test]
    fn hit_rate_threshold_preserves_results() {
        init();
        let mut strict = DFA::with_config(
            Config::new().cache_hit_threshold(0.99),
            "[a-z]+[0-9]",
        )
        .unwrap();
        let mut plain = dfa("[a-z]+[0-9]");
        let haystack: Vec<u8> =
            b"lorem ipsum dolor sit amet 42 consectetur adipiscing 7"
                .iter()
                .cycle()
                .take(540)
                .copied()
                .collect();
        assert_eq!(
            strict.search_at(&haystack, 0),
            plain.search_at(&haystack, 0),
        );
    }
}

mod reverse_limited {
    use super::*;

    #[test]
    fn match_within_window() {
        init();
        let mut re = rdfa("[a-z]+");
        assert_eq!(
            re.search_reverse_limited(b"123abc456", 0, 6, 0),
            ReverseLimited::Match(3),
        );
    }

    #[test]
    fn no_match_when_scanned_to_window_start() {
        init();
        let mut re = rdfa("[a-z]{8}");
        assert_eq!(
            re.search_reverse_limited(b"0123456789", 0, 10, 0),
            ReverseLimited::NoMatch,
        );
    }

    #[test]
    fn cut_off_scans_report_quadratic() {
        init();
        // Eight letters are needed but the floor only allows five bytes of
        // backward scanning: the automaton is still alive, so the caller
        // must be told to switch strategy.
        let mut re = rdfa("[a-z]{8}");
        assert_eq!(
            re.search_reverse_limited(b"abcdefghij", 0, 10, 5),
            ReverseLimited::Quadratic,
        );
    }

    #[test]
    fn found_match_beats_the_floor() {
        init();
        let mut re = rdfa("[a-z]{2}");
        assert_eq!(
            re.search_reverse_limited(b"abcdefghij", 0, 10, 5),
            ReverseLimited::Match(8),
        );
    }
}

mod acceleration {
    use super::*;

    #[test]
    fn skips_agree_with_byte_at_a_time() {
        init();
        // A long non-matching prefix drives the accelerated start state;
        // the result must equal the PikeVM's plain scan.
        let mut haystack = vec![b'x'; 1000];
        haystack.extend_from_slice(b"hello");
        haystack.extend(vec![b'y'; 100]);

        let mut re = dfa("hello");
        let mut vm = vm("hello");
        assert_eq!(
            re.search_at(&haystack, 0),
            vm.search_at(&haystack, 0).map(|(_, e)| e),
        );
        assert_eq!(re.search_at(&haystack, 0), Some(1005));
    }

    #[test]
    fn self_loop_interior() {
        init();
        let mut haystack = vec![b'a'; 500];
        haystack.push(b'b');
        let mut re = dfa("[^b]*b");
        assert_eq!(re.search_at(&haystack, 0), Some(501));
    }
}

mod classes {
    use super::*;

    /// Bytes in the same equivalence class are interchangeable.
    #[test]
    fn class_invariance() {
        init();
        let mut re = dfa("[a-m]+x");
        let classes = re.byte_classes().clone();
        assert_eq!(classes.get(b'c'), classes.get(b'd'));

        assert_eq!(re.search_at(b"zzcccx", 0), re.search_at(b"zzdddx", 0));
        assert_eq!(re.search_at(b"ccc", 0), re.search_at(b"ddd", 0));
    }

    #[test]
    fn alphabet_is_compact() {
        init();
        let re = dfa("hello");
        assert!(re.alphabet_len() <= 16);
        let re = dfa("[a-z]+");
        assert!(re.alphabet_len() <= 4);
        assert!(re.alphabet_len() >= 2);
    }
}

mod config {
    use super::*;

    fn is_invalid_config(result: Result<DFA, lazydfa::Error>) -> bool {
        matches!(
            result.unwrap_err().kind(),
            ErrorKind::InvalidConfig(_)
        )
    }

    #[test]
    fn rejects_bad_knobs() {
        init();
        assert!(is_invalid_config(DFA::with_config(
            Config::new().max_states(0),
            "abc",
        )));
        assert!(is_invalid_config(DFA::with_config(
            Config::new().cache_hit_threshold(1.5),
            "abc",
        )));
        assert!(is_invalid_config(DFA::with_config(
            Config::new().cache_hit_threshold(-0.1),
            "abc",
        )));
        assert!(is_invalid_config(DFA::with_config(
            Config::new().determinization_limit(0),
            "abc",
        )));
    }

    #[test]
    fn rejects_bad_patterns() {
        init();
        assert!(matches!(
            DFA::new("(").unwrap_err().kind(),
            ErrorKind::Syntax(_),
        ));
    }

    #[test]
    fn prefilter_can_be_disabled() {
        init();
        let mut with = dfa("hello");
        let mut without = DFA::with_config(
            Config::new().use_prefilter(false),
            "hello",
        )
        .unwrap();
        for h in [b"say hello world".as_slice(), b"nothing", b""] {
            assert_eq!(with.find(h), without.find(h));
        }
    }

    #[test]
    fn determinization_limit_falls_back() {
        init();
        // A tiny fanout limit cannot hold the subsets of this pattern, so
        // the searches run on the PikeVM, with identical results.
        let mut limited = DFA::with_config(
            Config::new().determinization_limit(2),
            "[a-z]+[0-9]+",
        )
        .unwrap();
        let mut plain = dfa("[a-z]+[0-9]+");
        assert_eq!(
            limited.search_at(b"abc123", 0),
            plain.search_at(b"abc123", 0),
        );
        assert!(limited.fallback_count() >= 1);
    }
}
