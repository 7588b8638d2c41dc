//! Resource types and their static rule table
//!
//! Every supported provider type has one row in [`RULES`]: the template
//! property carrying the physical name, the single configuration property
//! used for type-specific matching, and whether the resource holds state.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Provider resource type, e.g. `AWS::DynamoDB::Table`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(String);

/// Static rules for one resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeRules {
    /// Fully qualified type name
    pub type_name: &'static str,
    /// Template property holding the physical name
    pub physical_name_property: &'static str,
    /// Property compared against live configuration when matching
    pub config_property: &'static str,
    /// Whether data or identity must be preserved across migration
    pub stateful: bool,
    /// Properties whose divergence blocks a migration
    pub critical_properties: &'static [&'static str],
}

const RULES: &[TypeRules] = &[
    TypeRules {
        type_name: "AWS::DynamoDB::Table",
        physical_name_property: "TableName",
        config_property: "KeySchema",
        stateful: true,
        critical_properties: &["TableName", "KeySchema", "AttributeDefinitions"],
    },
    TypeRules {
        type_name: "AWS::S3::Bucket",
        physical_name_property: "BucketName",
        config_property: "VersioningConfiguration",
        stateful: true,
        critical_properties: &["BucketName"],
    },
    TypeRules {
        type_name: "AWS::Logs::LogGroup",
        physical_name_property: "LogGroupName",
        config_property: "RetentionInDays",
        stateful: true,
        critical_properties: &["LogGroupName"],
    },
    TypeRules {
        type_name: "AWS::RDS::DBInstance",
        physical_name_property: "DBInstanceIdentifier",
        config_property: "Engine",
        stateful: true,
        critical_properties: &["DBInstanceIdentifier", "Engine"],
    },
    TypeRules {
        type_name: "AWS::RDS::DBCluster",
        physical_name_property: "DBClusterIdentifier",
        config_property: "Engine",
        stateful: true,
        critical_properties: &["DBClusterIdentifier", "Engine"],
    },
    TypeRules {
        type_name: "AWS::SQS::Queue",
        physical_name_property: "QueueName",
        config_property: "FifoQueue",
        stateful: true,
        critical_properties: &["QueueName", "FifoQueue"],
    },
    TypeRules {
        type_name: "AWS::Kinesis::Stream",
        physical_name_property: "Name",
        config_property: "ShardCount",
        stateful: true,
        critical_properties: &["Name"],
    },
    TypeRules {
        type_name: "AWS::ECR::Repository",
        physical_name_property: "RepositoryName",
        config_property: "ImageTagMutability",
        stateful: true,
        critical_properties: &["RepositoryName"],
    },
    TypeRules {
        type_name: "AWS::SNS::Topic",
        physical_name_property: "TopicName",
        config_property: "FifoTopic",
        stateful: false,
        critical_properties: &["TopicName", "FifoTopic"],
    },
    TypeRules {
        type_name: "AWS::Lambda::Function",
        physical_name_property: "FunctionName",
        config_property: "Runtime",
        stateful: false,
        critical_properties: &["FunctionName"],
    },
    TypeRules {
        type_name: "AWS::IAM::Role",
        physical_name_property: "RoleName",
        config_property: "AssumeRolePolicyDocument",
        stateful: false,
        critical_properties: &["RoleName"],
    },
];

impl ResourceType {
    /// Create resource type from its fully qualified name
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// `AWS::DynamoDB::Table`
    #[must_use]
    pub fn dynamodb_table() -> Self {
        Self::new("AWS::DynamoDB::Table")
    }

    /// `AWS::S3::Bucket`
    #[must_use]
    pub fn s3_bucket() -> Self {
        Self::new("AWS::S3::Bucket")
    }

    /// `AWS::Logs::LogGroup`
    #[must_use]
    pub fn log_group() -> Self {
        Self::new("AWS::Logs::LogGroup")
    }

    /// `AWS::Lambda::Function`
    #[must_use]
    pub fn lambda_function() -> Self {
        Self::new("AWS::Lambda::Function")
    }

    /// Get type name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Look up the static rules for this type
    #[must_use]
    pub fn rules(&self) -> Option<&'static TypeRules> {
        RULES.iter().find(|r| r.type_name == self.0)
    }

    /// Whether discovery supports this type
    #[inline]
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.rules().is_some()
    }

    /// Template property carrying the physical name
    #[inline]
    #[must_use]
    pub fn physical_name_property(&self) -> Option<&'static str> {
        self.rules().map(|r| r.physical_name_property)
    }

    /// Property compared against live configuration when matching
    #[inline]
    #[must_use]
    pub fn config_property(&self) -> Option<&'static str> {
        self.rules().map(|r| r.config_property)
    }

    /// Whether the type holds state that must be imported, not recreated
    #[inline]
    #[must_use]
    pub fn is_stateful(&self) -> bool {
        self.rules().is_some_and(|r| r.stateful)
    }

    /// Check if a property is critical for this type
    #[must_use]
    pub fn is_critical_property(&self, property: &str) -> bool {
        self.rules()
            .is_some_and(|r| r.critical_properties.contains(&property))
    }

    /// Service segment, e.g. `dynamodb` for `AWS::DynamoDB::Table`
    #[must_use]
    pub fn service(&self) -> Option<String> {
        self.0.split("::").nth(1).map(str::to_lowercase)
    }

    /// All supported types
    pub fn supported() -> impl Iterator<Item = ResourceType> {
        RULES.iter().map(|r| ResourceType::new(r.type_name))
    }
}

impl Display for ResourceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
