//! Scheduler for managing the crawl frontier and rate limiting
//!
//! This module handles:
//! - FIFO queue management for request descriptors
//! - Duplicate suppression by request fingerprint
//! - The global request budget
//! - Respecting the minimum delay between requests

use crate::config::CrawlerConfig;
use crate::stages::CrawlRequest;
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

/// Scheduler manages the frontier queue and rate limiting
///
/// The scheduler coordinates:
/// - First-in first-out ordering of the frontier
/// - Dropping requests already scheduled once during this run
/// - The optional cap on requests issued
/// - The minimum time between consecutive requests
pub struct Scheduler {
    /// Requests waiting to be fetched
    frontier: VecDeque<CrawlRequest>,

    /// Fingerprints of every request ever accepted into the frontier
    seen: HashSet<String>,

    /// Minimum time between two requests
    interval: Duration,

    /// Maximum number of requests to hand out, if any
    budget: Option<u32>,

    /// Requests handed out so far
    issued: u32,

    /// When the last request was handed out
    last_request: Option<Instant>,

    /// Requests dropped as duplicates
    duplicates: u64,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `initial_frontier` - Initial requests to crawl
    ///
    /// # Returns
    ///
    /// A new Scheduler instance
    pub fn new(config: &CrawlerConfig, initial_frontier: Vec<CrawlRequest>) -> Self {
        let mut scheduler = Self {
            frontier: VecDeque::new(),
            seen: HashSet::new(),
            interval: Duration::from_millis(config.minimum_request_interval),
            budget: config.max_total_requests,
            issued: 0,
            last_request: None,
            duplicates: 0,
        };

        for request in initial_frontier {
            scheduler.add_to_frontier(request);
        }

        scheduler
    }

    /// Adds a request to the back of the frontier
    ///
    /// Returns `false` if a request with the same fingerprint was already
    /// scheduled during this run.
    pub fn add_to_frontier(&mut self, request: CrawlRequest) -> bool {
        if !self.seen.insert(request.fingerprint()) {
            self.duplicates += 1;
            tracing::trace!("Dropping duplicate request for {}", request.url);
            return false;
        }
        self.frontier.push_back(request);
        true
    }

    /// Gets the next request to fetch
    ///
    /// This method:
    /// 1. Returns None if the frontier is empty or the budget is spent
    /// 2. Sleeps until the minimum interval since the last request has passed
    /// 3. Returns the oldest queued request
    pub async fn next_request(&mut self) -> Option<CrawlRequest> {
        if self.budget_exhausted() {
            return None;
        }
        let request = self.frontier.pop_front()?;

        if let Some(wait) = self.time_until_next_request(Instant::now()) {
            tracing::trace!("Waiting {:?} before next request", wait);
            tokio::time::sleep(wait).await;
        }

        self.issued += 1;
        self.last_request = Some(Instant::now());
        Some(request)
    }

    /// Time left before another request may be issued, if any
    fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let last = self.last_request?;
        let ready_at = last + self.interval;
        if ready_at > now {
            Some(ready_at - now)
        } else {
            None
        }
    }

    /// Whether the request budget has been used up
    pub fn budget_exhausted(&self) -> bool {
        matches!(self.budget, Some(budget) if self.issued >= budget)
    }

    /// Empties the frontier, returning what was still queued
    pub fn drain_remaining(&mut self) -> Vec<CrawlRequest> {
        self.frontier.drain(..).collect()
    }

    /// Returns the number of requests in the frontier
    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }

    /// Returns whether the frontier is empty
    pub fn is_empty(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Number of requests handed out so far
    pub fn issued(&self) -> u32 {
        self.issued
    }

    /// Number of requests dropped as duplicates
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }
}
