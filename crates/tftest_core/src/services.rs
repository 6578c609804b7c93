//! Built-in mock-able service endpoints.
//!
//! Names are the provider's custom-endpoint keys. A job's provider file maps every one of them to the job's mock
//! service unless the caller restricts the list.

/// Every endpoint key the generated provider overrides by default.
///
/// `codestarnotifications` is deliberately absent: the provider rejects a custom endpoint for it.
pub const DEFAULT_SERVICES: &[&str] = &[
    "accessanalyzer",
    "acm",
    "acmpca",
    "amplify",
    "apigateway",
    "applicationautoscaling",
    "applicationinsights",
    "appmesh",
    "appstream",
    "appsync",
    "athena",
    "autoscaling",
    "autoscalingplans",
    "backup",
    "batch",
    "budgets",
    "cloud9",
    "cloudformation",
    "cloudfront",
    "cloudhsm",
    "cloudsearch",
    "cloudtrail",
    "cloudwatch",
    "cloudwatchevents",
    "cloudwatchlogs",
    "codebuild",
    "codecommit",
    "codedeploy",
    "codepipeline",
    "cognitoidentity",
    "cognitoidp",
    "configservice",
    "cur",
    "dataexchange",
    "datapipeline",
    "datasync",
    "dax",
    "devicefarm",
    "directconnect",
    "dlm",
    "dms",
    "docdb",
    "ds",
    "dynamodb",
    "ec2",
    "ecr",
    "ecs",
    "efs",
    "eks",
    "elasticache",
    "elasticbeanstalk",
    "elastictranscoder",
    "elb",
    "emr",
    "es",
    "firehose",
    "fms",
    "forecast",
    "fsx",
    "gamelift",
    "glacier",
    "globalaccelerator",
    "glue",
    "guardduty",
    "greengrass",
    "iam",
    "imagebuilder",
    "inspector",
    "iot",
    "iotanalytics",
    "iotevents",
    "kafka",
    "kinesis",
    "kinesisanalytics",
    "kinesisvideo",
    "kms",
    "lakeformation",
    "lambda",
    "lexmodels",
    "licensemanager",
    "lightsail",
    "macie",
    "managedblockchain",
    "marketplacecatalog",
    "mediaconnect",
    "mediaconvert",
    "medialive",
    "mediapackage",
    "mediastore",
    "mediastoredata",
    "mq",
    "neptune",
    "opsworks",
    "organizations",
    "personalize",
    "pinpoint",
    "pricing",
    "qldb",
    "quicksight",
    "ram",
    "rds",
    "redshift",
    "resourcegroups",
    "route53",
    "route53resolver",
    "s3",
    "s3control",
    "sagemaker",
    "sdb",
    "secretsmanager",
    "securityhub",
    "serverlessrepo",
    "servicecatalog",
    "servicediscovery",
    "servicequotas",
    "ses",
    "shield",
    "sns",
    "sqs",
    "ssm",
    "stepfunctions",
    "storagegateway",
    "sts",
];

/// Resolve the target service list: the caller's list when non-empty, otherwise [`DEFAULT_SERVICES`].
pub fn resolve<'a>(requested: &'a [String]) -> Vec<&'a str> {
    if requested.is_empty() {
        DEFAULT_SERVICES.to_vec()
    } else {
        requested.iter().map(String::as_str).collect()
    }
}
