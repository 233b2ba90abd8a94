use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "llm": {
                "type": "object",
                "properties": {
                    "provider": { "type": "string" },
                    "api_key": { "type": "string" },
                    "base_url": { "type": "string", "format": "uri" },
                    "provider_keys": {
                        "type": "object",
                        "additionalProperties": { "type": "string" }
                    }
                }
            },
            "tiers": {
                "type": "object",
                "properties": {
                    "free": { "$ref": "#/$defs/tier" },
                    "premium": { "$ref": "#/$defs/tier" }
                }
            },
            "dispatch": {
                "type": "object",
                "properties": {
                    "max_concurrency": { "type": "integer", "minimum": 1, "maximum": 64 },
                    "max_retries": { "type": "integer", "minimum": 0, "maximum": 5 }
                }
            },
            "scoring": {
                "type": "object",
                "properties": {
                    "critical_penalty": { "type": "integer", "minimum": 0, "maximum": 100 },
                    "high_penalty": { "type": "integer", "minimum": 0, "maximum": 100 },
                    "medium_penalty": { "type": "integer", "minimum": 0, "maximum": 100 },
                    "floor": { "type": "integer", "minimum": 0, "maximum": 100 }
                }
            },
            "agents": {
                "type": "array",
                "items": { "$ref": "#/$defs/agent" }
            },
            "explorer": {
                "type": "object",
                "properties": {
                    "api_key": { "type": "string" },
                    "networks": {
                        "type": "object",
                        "additionalProperties": { "type": "string", "format": "uri" }
                    }
                }
            },
            "prompts": {
                "type": "object",
                "properties": {
                    "directory": { "type": "string" }
                }
            },
            "output": {
                "type": "object",
                "properties": {
                    "directory": { "type": "string" },
                    "format": { "type": "string", "enum": ["json", "markdown", "both"] }
                }
            }
        },
        "$defs": {
            "tier": {
                "type": "object",
                "properties": {
                    "token_budget": { "type": "integer", "minimum": 1 },
                    "supervisor_token_budget": { "type": "integer", "minimum": 1 },
                    "call_timeout_secs": { "type": "integer", "minimum": 1 },
                    "supervisor_timeout_secs": { "type": "integer", "minimum": 1 },
                    "analysis_depth": { "type": "string" },
                    "prompt_variant": { "type": "string", "enum": ["full", "security_focused"] }
                }
            },
            "agent": {
                "type": "object",
                "required": ["id", "display_name", "specialty", "tier", "provider", "model"],
                "properties": {
                    "id": { "type": "string", "minLength": 1 },
                    "display_name": { "type": "string" },
                    "specialty": {
                        "type": "string",
                        "enum": ["security", "gas", "quality", "general", "verification"]
                    },
                    "tier": { "type": "string", "enum": ["free", "premium"] },
                    "provider": { "type": "string" },
                    "model": { "type": "string" }
                }
            }
        }
    })
});
