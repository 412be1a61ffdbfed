// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Name of the context a breaker was created from, usually the calling component.
pub(crate) const PIPELINE_NAME: &str = "resilience.pipeline.name";

/// Name of the individual breaker.
pub(crate) const STRATEGY_NAME: &str = "resilience.strategy.name";

/// The event being reported, in `snake_case`, e.g. `circuit_opened`.
pub(crate) const EVENT_NAME: &str = "resilience.event.name";
