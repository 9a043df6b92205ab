pub mod subscription_fields;
