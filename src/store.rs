//! Metric aggregation store
//!
//! Application code mutates counters and gauges through [`PluginInstance`]
//! handles at any time; the flush driver reads everything once per interval
//! through [`MetricStore::drain_snapshot`].
//!
//! - Counters are cumulative and never reset: the collector computes rates.
//! - Gauges are averaged over the interval: each flush reports
//!   `sum / samples` per position, then clears the accumulator.

use crate::protocol::Value;
use std::collections::BTreeMap;

/// Ordered sequence of sample values, normalised from a scalar or a list
#[derive(Debug, Clone, PartialEq)]
pub struct Samples<T>(Vec<T>);

impl<T> Samples<T> {
    /// The values in order
    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    /// Unwrap into the inner vector
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl From<u64> for Samples<u64> {
    fn from(value: u64) -> Self {
        Samples(vec![value])
    }
}

impl From<f64> for Samples<f64> {
    fn from(value: f64) -> Self {
        Samples(vec![value])
    }
}

impl<T> From<Vec<T>> for Samples<T> {
    fn from(values: Vec<T>) -> Self {
        Samples(values)
    }
}

impl<T: Copy> From<&[T]> for Samples<T> {
    fn from(values: &[T]) -> Self {
        Samples(values.to_vec())
    }
}

impl<T, const N: usize> From<[T; N]> for Samples<T> {
    fn from(values: [T; N]) -> Self {
        Samples(Vec::from(values))
    }
}

/// Identifies one time series
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricKey {
    /// Plugin name
    pub plugin: String,
    /// Plugin instance
    pub plugin_instance: String,
    /// Type name
    pub type_name: String,
    /// Type instance
    pub type_instance: String,
}

/// One series ready for encoding
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// Series identity
    pub key: MetricKey,
    /// Values, all of the same kind
    pub values: Vec<Value>,
}

/// Cumulative counter values, one per sub-value position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterSeries {
    values: Vec<u64>,
}

impl CounterSeries {
    /// Add increments element-wise, growing the series with zeros as needed
    pub fn add(&mut self, increments: &[u64]) {
        if self.values.len() < increments.len() {
            self.values.resize(increments.len(), 0);
        }
        for (value, inc) in self.values.iter_mut().zip(increments) {
            *value = value.wrapping_add(*inc);
        }
    }

    /// Overwrite with absolute values
    pub fn set(&mut self, values: &[u64]) {
        self.values.clear();
        self.values.extend_from_slice(values);
    }

    /// Current values
    pub fn values(&self) -> &[u64] {
        &self.values
    }
}

/// Running sums for averaging gauge samples over an interval
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GaugeAccumulator {
    samples: u64,
    sums: Vec<f64>,
}

impl GaugeAccumulator {
    /// Record one sample (one value per position); an empty sample is ignored
    pub fn record(&mut self, values: &[f64]) {
        if values.is_empty() {
            return;
        }
        self.samples += 1;
        if self.sums.len() < values.len() {
            self.sums.resize(values.len(), 0.0);
        }
        for (sum, value) in self.sums.iter_mut().zip(values) {
            *sum += value;
        }
    }

    /// Number of samples since the last reset
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Per-position mean, or `None` without samples
    pub fn average(&self) -> Option<Vec<f64>> {
        if self.samples == 0 {
            return None;
        }
        let n = self.samples as f64;
        Some(self.sums.iter().map(|sum| sum / n).collect())
    }

    /// Return the mean and clear the accumulator
    pub fn take_average(&mut self) -> Option<Vec<f64>> {
        let average = self.average();
        self.reset();
        average
    }

    /// Clear samples and sums
    pub fn reset(&mut self) {
        self.samples = 0;
        self.sums.clear();
    }
}

type Nested<T> = BTreeMap<String, BTreeMap<String, T>>;

fn entry<'a, T: Default>(map: &'a mut Nested<T>, key1: &str, key2: &str) -> &'a mut T {
    map.entry(key1.to_string())
        .or_default()
        .entry(key2.to_string())
        .or_default()
}

/// Counters and gauges of one (plugin, instance) pair
#[derive(Debug, Clone)]
pub struct PluginInstance {
    plugin: String,
    instance: String,
    counters: Nested<CounterSeries>,
    gauges: Nested<GaugeAccumulator>,
}

impl PluginInstance {
    /// Create an empty plugin instance
    pub fn new(plugin: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            instance: instance.into(),
            counters: BTreeMap::new(),
            gauges: BTreeMap::new(),
        }
    }

    /// Plugin name
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Plugin instance
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Add to a counter series
    pub fn add_counter(
        &mut self,
        type_name: &str,
        type_instance: &str,
        increments: impl Into<Samples<u64>>,
    ) {
        entry(&mut self.counters, type_name, type_instance).add(increments.into().as_slice());
    }

    /// Overwrite a counter series
    pub fn set_counter(
        &mut self,
        type_name: &str,
        type_instance: &str,
        values: impl Into<Samples<u64>>,
    ) {
        entry(&mut self.counters, type_name, type_instance).set(values.into().as_slice());
    }

    /// Record a gauge sample
    pub fn set_gauge(
        &mut self,
        type_name: &str,
        type_instance: &str,
        values: impl Into<Samples<f64>>,
    ) {
        entry(&mut self.gauges, type_name, type_instance).record(values.into().as_slice());
    }

    /// Look up a counter series
    pub fn counter(&self, type_name: &str, type_instance: &str) -> Option<&CounterSeries> {
        self.counters.get(type_name)?.get(type_instance)
    }

    /// Look up a gauge accumulator
    pub fn gauge(&self, type_name: &str, type_instance: &str) -> Option<&GaugeAccumulator> {
        self.gauges.get(type_name)?.get(type_instance)
    }

    fn key(&self, type_name: &str, type_instance: &str) -> MetricKey {
        MetricKey {
            plugin: self.plugin.clone(),
            plugin_instance: self.instance.clone(),
            type_name: type_name.to_string(),
            type_instance: type_instance.to_string(),
        }
    }

    /// Counters as they stand, then averaged gauges (which are reset).
    /// Series without any position are skipped.
    fn drain_into(&mut self, out: &mut Vec<MetricSample>) {
        for (type_name, instances) in &self.counters {
            for (type_instance, series) in instances {
                if series.values().is_empty() {
                    continue;
                }
                out.push(MetricSample {
                    key: self.key(type_name, type_instance),
                    values: series.values().iter().map(|v| Value::Counter(*v)).collect(),
                });
            }
        }

        let mut gauges = Vec::new();
        for (type_name, instances) in self.gauges.iter_mut() {
            for (type_instance, accumulator) in instances.iter_mut() {
                if let Some(average) = accumulator.take_average().filter(|a| !a.is_empty()) {
                    gauges.push((type_name.clone(), type_instance.clone(), average));
                }
            }
        }
        for (type_name, type_instance, average) in gauges {
            out.push(MetricSample {
                key: self.key(&type_name, &type_instance),
                values: average.into_iter().map(Value::Gauge).collect(),
            });
        }
    }
}

/// All plugin instances of one client, keyed by plugin then instance
#[derive(Debug, Clone, Default)]
pub struct MetricStore {
    plugins: Nested<PluginInstance>,
}

impl MetricStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or lazily create the handle for (plugin, instance)
    pub fn plugin_instance(&mut self, plugin: &str, instance: &str) -> &mut PluginInstance {
        self.plugins
            .entry(plugin.to_string())
            .or_default()
            .entry(instance.to_string())
            .or_insert_with(|| PluginInstance::new(plugin, instance))
    }

    /// Look up an existing plugin instance
    pub fn get(&self, plugin: &str, instance: &str) -> Option<&PluginInstance> {
        self.plugins.get(plugin)?.get(instance)
    }

    /// Number of plugin instances
    pub fn len(&self) -> usize {
        self.plugins.values().map(BTreeMap::len).sum()
    }

    /// Check if no plugin instance exists
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read every series for one flush: counters unchanged, gauges averaged
    /// and reset. Gauges without samples since the last flush are skipped.
    pub fn drain_snapshot(&mut self) -> Vec<MetricSample> {
        let mut out = Vec::new();
        for instances in self.plugins.values_mut() {
            for plugin_instance in instances.values_mut() {
                plugin_instance.drain_into(&mut out);
            }
        }
        out
    }
}
