pub mod orchestrations;
