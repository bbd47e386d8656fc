use std::collections::{BTreeMap, HashMap};

use crate::{
    histogram::DurationHistogram,
    proto::{self, trace},
};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Size added to the report estimate for each trace folded into statistics.
pub(crate) const STATS_ENTRY_SIZE_ESTIMATE: usize = 16;

/// Statistics of one operation, split by client.
#[derive(Debug, Default)]
pub struct OperationStats {
    by_context: HashMap<proto::StatsContext, ContextStats>,
}

#[derive(Debug, Default)]
struct ContextStats {
    request_count: u64,
    cache_hits: u64,
    persisted_query_hits: u64,
    persisted_query_misses: u64,
    requests_with_errors_count: u64,
    registered_operation_count: u64,
    forbidden_operation_count: u64,
    requests_without_field_instrumentation: u64,
    latency: DurationHistogram,
    cache_latency: DurationHistogram,
    public_cache_ttl: DurationHistogram,
    private_cache_ttl: DurationHistogram,
    per_type: BTreeMap<String, BTreeMap<String, FieldStats>>,
}

#[derive(Debug, Default)]
struct FieldStats {
    return_type: String,
    errors_count: u64,
    observed_execution_count: u64,
    estimated_execution_count: f64,
    requests_with_errors_count: u64,
    latency: DurationHistogram,
}

impl OperationStats {
    /// Folds a trace into the statistics of its client. Returns an estimate of the bytes it
    /// added to the encoded report.
    pub fn add_trace(&mut self, trace: &proto::Trace) -> usize {
        let context = proto::StatsContext {
            client_name: trace.client_name.clone(),
            client_version: trace.client_version.clone(),
        };

        let mut size = STATS_ENTRY_SIZE_ESTIMATE;
        if !self.by_context.contains_key(&context) {
            size += 20 + context.client_name.len() + context.client_version.len();
        }

        let stats = self.by_context.entry(context).or_default();
        stats.request_count += 1;

        if trace.full_query_cache_hit {
            stats.cache_hits += 1;
            stats.cache_latency.increment_duration(trace.duration_ns);
        } else {
            stats.latency.increment_duration(trace.duration_ns);

            if let Some(policy) = &trace.cache_policy {
                let ttl = u64::try_from(policy.max_age_ns).unwrap_or_default();
                if policy.scope == trace::cache_policy::Scope::Private as i32 {
                    stats.private_cache_ttl.increment_duration(ttl);
                } else {
                    stats.public_cache_ttl.increment_duration(ttl);
                }
            }
        }

        if trace.persisted_query_hit {
            stats.persisted_query_hits += 1;
        }
        if trace.persisted_query_register {
            stats.persisted_query_misses += 1;
        }
        if trace.registered_operation {
            stats.registered_operation_count += 1;
        }
        if trace.forbidden_operation {
            stats.forbidden_operation_count += 1;
        }

        let mut has_errors = false;
        match &trace.root {
            Some(root) => {
                size += stats.add_node(root, trace.field_execution_weight, &mut has_errors);
            }
            None => stats.requests_without_field_instrumentation += 1,
        }

        if has_errors {
            stats.requests_with_errors_count += 1;
        }

        size
    }

    pub fn into_proto(self) -> Vec<proto::ContextualizedStats> {
        self.by_context
            .into_iter()
            .map(|(context, stats)| stats.into_proto(context))
            .collect()
    }
}

impl ContextStats {
    fn add_node(&mut self, node: &trace::Node, weight: f64, has_errors: &mut bool) -> usize {
        let mut size = 0;

        if !node.error.is_empty() {
            *has_errors = true;
        }

        if let Some(trace::node::Id::ResponseName(response_name)) = &node.id {
            if !node.parent_type.is_empty() && !node.r#type.is_empty() {
                let field_name = if node.original_field_name.is_empty() {
                    response_name
                } else {
                    &node.original_field_name
                };

                let fields = self.per_type.entry(node.parent_type.clone()).or_default();
                if !fields.contains_key(field_name) {
                    size += 2 + node.parent_type.len() + field_name.len() + node.r#type.len();
                }

                let field = fields.entry(field_name.clone()).or_default();
                if field.return_type.is_empty() {
                    field.return_type = node.r#type.clone();
                }
                field.errors_count += node.error.len() as u64;
                field.observed_execution_count += 1;
                field.estimated_execution_count += weight;
                if !node.error.is_empty() {
                    field.requests_with_errors_count += 1;
                }
                field.latency.increment_duration(node.end_time.saturating_sub(node.start_time));
            }
        }

        for child in &node.child {
            size += self.add_node(child, weight, has_errors);
        }

        size
    }

    fn into_proto(self, context: proto::StatsContext) -> proto::ContextualizedStats {
        let per_type_stat = self
            .per_type
            .into_iter()
            .map(|(type_name, fields)| {
                let per_field_stat = fields
                    .into_iter()
                    .map(|(field_name, field)| {
                        let stat = proto::FieldStat {
                            return_type: field.return_type,
                            errors_count: field.errors_count,
                            observed_execution_count: field.observed_execution_count,
                            requests_with_errors_count: field.requests_with_errors_count,
                            latency_count: field.latency.to_compressed(),
                            estimated_execution_count: field.estimated_execution_count.round() as u64,
                        };
                        (field_name, stat)
                    })
                    .collect();

                (type_name, proto::TypeStat { per_field_stat })
            })
            .collect();

        proto::ContextualizedStats {
            context: Some(context),
            query_latency_stats: Some(proto::QueryLatencyStats {
                request_count: self.request_count,
                cache_hits: self.cache_hits,
                persisted_query_hits: self.persisted_query_hits,
                persisted_query_misses: self.persisted_query_misses,
                requests_with_errors_count: self.requests_with_errors_count,
                registered_operation_count: self.registered_operation_count,
                forbidden_operation_count: self.forbidden_operation_count,
                latency_count: self.latency.to_compressed(),
                cache_latency_count: self.cache_latency.to_compressed(),
                public_cache_ttl_count: self.public_cache_ttl.to_compressed(),
                private_cache_ttl_count: self.private_cache_ttl.to_compressed(),
                requests_without_field_instrumentation: self.requests_without_field_instrumentation,
            }),
            per_type_stat,
        }
    }
}

/// Cache policy of a trace, maxAge in nanoseconds.
pub(crate) fn trace_cache_policy(max_age_seconds: u32, private: bool) -> trace::CachePolicy {
    let scope = if private {
        trace::cache_policy::Scope::Private
    } else {
        trace::cache_policy::Scope::Public
    };

    trace::CachePolicy {
        scope: scope as i32,
        max_age_ns: i64::from(max_age_seconds) * NANOS_PER_SECOND,
    }
}
