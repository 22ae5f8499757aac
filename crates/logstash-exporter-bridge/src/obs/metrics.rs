//! In-process metrics registry rendered in the Prometheus text format.
//!
//! Series live in `DashMap`s keyed by label values (in the family's declared
//! label order) and are updated through atomics, so a scrape never waits on
//! the ingestion loop and each series update is independently linearizable.
//! Gauges and histogram sums hold `f64` bit patterns in `AtomicU64`.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use logstash_exporter_core::error::{ExporterError, Result};

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Float rendering accepted by Prometheus parsers.
fn fmt_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".into()
    } else if v == f64::INFINITY {
        "+Inf".into()
    } else if v == f64::NEG_INFINITY {
        "-Inf".into()
    } else {
        format!("{v}")
    }
}

/// `count` upper bounds starting at `start`, each `width` apart.
pub fn linear_buckets(start: f64, width: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| start + width * i as f64).collect()
}

fn add_f64(cell: &AtomicU64, delta: f64) {
    let _ = cell.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
        Some((f64::from_bits(bits) + delta).to_bits())
    });
}

fn label_key(names: &[&'static str], values: &[&str]) -> Result<Vec<String>> {
    if names.len() != values.len() {
        return Err(ExporterError::Internal(format!(
            "expected {} label values, got {}",
            names.len(),
            values.len()
        )));
    }
    Ok(values.iter().map(|v| v.to_string()).collect())
}

/// Render `{k="v",...}` with an optional trailing `le` label.
fn label_block(names: &[&'static str], values: &[String], le: Option<&str>) -> String {
    let mut parts: Vec<String> = names
        .iter()
        .zip(values)
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect();
    if let Some(le) = le {
        parts.push(format!("le=\"{le}\""));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", parts.join(","))
    }
}

fn sorted_keys<V>(map: &DashMap<Vec<String>, V>) -> Vec<Vec<String>> {
    let mut keys: Vec<Vec<String>> = map.iter().map(|r| r.key().clone()).collect();
    keys.sort();
    keys
}

pub struct CounterVec {
    label_names: Vec<&'static str>,
    map: DashMap<Vec<String>, AtomicU64>,
}

impl CounterVec {
    pub fn new(label_names: &[&'static str]) -> Self {
        Self { label_names: label_names.to_vec(), map: DashMap::new() }
    }

    /// Increment by 1.
    pub fn inc(&self, values: &[&str]) -> Result<()> {
        self.add(values, 1)
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, values: &[&str], v: u64) -> Result<()> {
        let key = label_key(&self.label_names, values)?;
        let counter = self.map.entry(key).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
        Ok(())
    }

    /// Current value; `None` if the series was never touched.
    pub fn get(&self, values: &[&str]) -> Option<u64> {
        let key = label_key(&self.label_names, values).ok()?;
        self.map.get(&key).map(|c| c.load(Ordering::Relaxed))
    }

    fn render(&self, name: &str, out: &mut String) {
        for key in sorted_keys(&self.map) {
            if let Some(c) = self.map.get(&key) {
                let val = c.load(Ordering::Relaxed);
                let _ = writeln!(out, "{}{} {}", name, label_block(&self.label_names, &key, None), val);
            }
        }
    }
}

pub struct GaugeVec {
    label_names: Vec<&'static str>,
    map: DashMap<Vec<String>, AtomicU64>,
}

impl GaugeVec {
    pub fn new(label_names: &[&'static str]) -> Self {
        Self { label_names: label_names.to_vec(), map: DashMap::new() }
    }

    /// Set to `v`; last write wins.
    pub fn set(&self, values: &[&str], v: f64) -> Result<()> {
        let key = label_key(&self.label_names, values)?;
        let gauge = self.map.entry(key).or_insert_with(|| AtomicU64::new(0));
        gauge.store(v.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    pub fn get(&self, values: &[&str]) -> Option<f64> {
        let key = label_key(&self.label_names, values).ok()?;
        self.map.get(&key).map(|g| f64::from_bits(g.load(Ordering::Relaxed)))
    }

    fn render(&self, name: &str, out: &mut String) {
        for key in sorted_keys(&self.map) {
            if let Some(g) = self.map.get(&key) {
                let val = f64::from_bits(g.load(Ordering::Relaxed));
                let _ = writeln!(out, "{}{} {}", name, label_block(&self.label_names, &key, None), fmt_float(val));
            }
        }
    }
}

struct AtomicHistogram {
    count: AtomicU64,
    sum: AtomicU64,
    /// Cumulative: bucket `i` counts observations `<= bounds[i]`.
    buckets: Vec<AtomicU64>,
}

impl AtomicHistogram {
    fn new(n: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0f64.to_bits()),
            buckets: (0..n).map(|_| AtomicU64::new(0)).collect(),
        }
    }
}

/// Point-in-time copy of one histogram series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum: f64,
    /// `(upper bound, cumulative count)`, `+Inf` excluded.
    pub buckets: Vec<(f64, u64)>,
}

pub struct HistogramVec {
    label_names: Vec<&'static str>,
    bounds: Vec<f64>,
    map: DashMap<Vec<String>, AtomicHistogram>,
}

impl HistogramVec {
    /// `bounds` must be ascending; they are fixed for the registry's lifetime.
    pub fn new(label_names: &[&'static str], bounds: Vec<f64>) -> Self {
        Self { label_names: label_names.to_vec(), bounds, map: DashMap::new() }
    }

    /// Observe a value and increment cumulative buckets.
    pub fn observe(&self, values: &[&str], v: f64) -> Result<()> {
        let key = label_key(&self.label_names, values)?;
        let n = self.bounds.len();
        let hist = self.map.entry(key).or_insert_with(|| AtomicHistogram::new(n));

        hist.count.fetch_add(1, Ordering::Relaxed);
        add_f64(&hist.sum, v);

        for (bucket, &le) in hist.buckets.iter().zip(&self.bounds) {
            if v <= le {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    pub fn snapshot(&self, values: &[&str]) -> Option<HistogramSnapshot> {
        let key = label_key(&self.label_names, values).ok()?;
        let hist = self.map.get(&key)?;
        Some(HistogramSnapshot {
            count: hist.count.load(Ordering::Relaxed),
            sum: f64::from_bits(hist.sum.load(Ordering::Relaxed)),
            buckets: self
                .bounds
                .iter()
                .zip(&hist.buckets)
                .map(|(&le, b)| (le, b.load(Ordering::Relaxed)))
                .collect(),
        })
    }

    fn render(&self, name: &str, out: &mut String) {
        for key in sorted_keys(&self.map) {
            let Some(hist) = self.map.get(&key) else { continue };

            for (&le, bucket) in self.bounds.iter().zip(&hist.buckets) {
                let labels = label_block(&self.label_names, &key, Some(&fmt_float(le)));
                let _ = writeln!(out, "{}_bucket{} {}", name, labels, bucket.load(Ordering::Relaxed));
            }
            let count = hist.count.load(Ordering::Relaxed);
            let labels = label_block(&self.label_names, &key, Some("+Inf"));
            let _ = writeln!(out, "{}_bucket{} {}", name, labels, count);

            let plain = label_block(&self.label_names, &key, None);
            let sum = f64::from_bits(hist.sum.load(Ordering::Relaxed));
            let _ = writeln!(out, "{}_sum{} {}", name, plain, fmt_float(sum));
            let _ = writeln!(out, "{}_count{} {}", name, plain, count);
        }
    }
}

#[derive(Clone)]
enum Series {
    Counter(Arc<CounterVec>),
    Gauge(Arc<GaugeVec>),
    Histogram(Arc<HistogramVec>),
}

impl Series {
    fn type_name(&self) -> &'static str {
        match self {
            Series::Counter(_) => "counter",
            Series::Gauge(_) => "gauge",
            Series::Histogram(_) => "histogram",
        }
    }
}

struct Family {
    name: String,
    help: String,
    series: Series,
}

/// Named metric families, rendered in registration order.
#[derive(Default)]
pub struct Registry {
    families: RwLock<Vec<Family>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_counter(&self, name: &str, help: &str, labels: &[&'static str]) -> Result<Arc<CounterVec>> {
        let vec = Arc::new(CounterVec::new(labels));
        self.register(name, help, Series::Counter(Arc::clone(&vec)))?;
        Ok(vec)
    }

    pub fn register_gauge(&self, name: &str, help: &str, labels: &[&'static str]) -> Result<Arc<GaugeVec>> {
        let vec = Arc::new(GaugeVec::new(labels));
        self.register(name, help, Series::Gauge(Arc::clone(&vec)))?;
        Ok(vec)
    }

    pub fn register_histogram(
        &self,
        name: &str,
        help: &str,
        labels: &[&'static str],
        bounds: Vec<f64>,
    ) -> Result<Arc<HistogramVec>> {
        if bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ExporterError::Internal(format!("histogram {name} buckets must be ascending")));
        }
        let vec = Arc::new(HistogramVec::new(labels, bounds));
        self.register(name, help, Series::Histogram(Arc::clone(&vec)))?;
        Ok(vec)
    }

    fn register(&self, name: &str, help: &str, series: Series) -> Result<()> {
        let mut families = self
            .families
            .write()
            .map_err(|_| ExporterError::Internal("metrics registry lock poisoned".into()))?;
        if families.iter().any(|f| f.name == name) {
            return Err(ExporterError::Internal(format!("metric {name} already registered")));
        }
        families.push(Family { name: name.to_string(), help: help.to_string(), series });
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<Series> {
        let families = self
            .families
            .read()
            .map_err(|_| ExporterError::Internal("metrics registry lock poisoned".into()))?;
        families
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.series.clone())
            .ok_or_else(|| ExporterError::Internal(format!("unknown metric {name}")))
    }

    /// Resolve `(label, value)` pairs against the family's declared labels.
    fn ordered<'a>(names: &[&'static str], labels: &[(&str, &'a str)]) -> Result<Vec<&'a str>> {
        if names.len() != labels.len() {
            return Err(ExporterError::Internal(format!(
                "expected labels {names:?}, got {} pairs",
                labels.len()
            )));
        }
        names
            .iter()
            .map(|n| {
                labels
                    .iter()
                    .find(|(k, _)| k == n)
                    .map(|(_, v)| *v)
                    .ok_or_else(|| ExporterError::Internal(format!("missing label {n}")))
            })
            .collect()
    }

    pub fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) -> Result<()> {
        match self.lookup(name)? {
            Series::Counter(c) => c.inc(&Self::ordered(&c.label_names, labels)?),
            other => Err(ExporterError::Internal(format!("{name} is a {}, not a counter", other.type_name()))),
        }
    }

    pub fn set_gauge(&self, name: &str, labels: &[(&str, &str)], value: f64) -> Result<()> {
        match self.lookup(name)? {
            Series::Gauge(g) => g.set(&Self::ordered(&g.label_names, labels)?, value),
            other => Err(ExporterError::Internal(format!("{name} is a {}, not a gauge", other.type_name()))),
        }
    }

    pub fn observe_histogram(&self, name: &str, labels: &[(&str, &str)], value: f64) -> Result<()> {
        match self.lookup(name)? {
            Series::Histogram(h) => h.observe(&Self::ordered(&h.label_names, labels)?, value),
            other => Err(ExporterError::Internal(format!("{name} is a {}, not a histogram", other.type_name()))),
        }
    }

    /// Render every family in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let Ok(families) = self.families.read() else {
            return out;
        };
        for f in families.iter() {
            let _ = writeln!(out, "# HELP {} {}", f.name, escape_help(&f.help));
            let _ = writeln!(out, "# TYPE {} {}", f.name, f.series.type_name());
            match &f.series {
                Series::Counter(c) => c.render(&f.name, &mut out),
                Series::Gauge(g) => g.render(&f.name, &mut out),
                Series::Histogram(h) => h.render(&f.name, &mut out),
            }
        }
        out
    }
}
